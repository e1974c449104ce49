//! Core data types for sensing, actuation and mode governance.
//!
//! Key types:
//! - [`DistanceReading`]: tagged ranger result; never compare a raw sentinel
//! - [`MotionCommand`]: signed per-wheel duty pair in `[-1, 1]`
//! - [`OperatingMode`]: WORK / PAUSE, mutated only through a toggle
//! - [`EscapeDecision`]: outcome of one escape maneuver

use serde::{Deserialize, Serialize};
use std::fmt;

/// One forward distance measurement.
///
/// Drivers report raw centimeters where a non-positive or non-finite value
/// means "no echo / timeout". [`DistanceReading::from_raw_cm`] folds that
/// convention into `Invalid` so proximity checks cannot mistake a dropout
/// for a very close obstacle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DistanceReading {
    /// Valid measurement in centimeters (always > 0)
    Valid(f32),
    /// No echo, timeout or otherwise unusable sample
    #[default]
    Invalid,
}

impl DistanceReading {
    /// Classify a raw driver value
    pub fn from_raw_cm(raw: f32) -> Self {
        if raw.is_finite() && raw > 0.0 {
            Self::Valid(raw)
        } else {
            Self::Invalid
        }
    }

    /// Distance in centimeters, if valid
    #[inline]
    pub fn cm(&self) -> Option<f32> {
        match *self {
            Self::Valid(cm) => Some(cm),
            Self::Invalid => None,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// True only for a valid reading strictly below `threshold_cm`
    #[inline]
    pub fn is_closer_than(&self, threshold_cm: f32) -> bool {
        matches!(*self, Self::Valid(cm) if cm < threshold_cm)
    }

    /// Raw centimeters a no-echo reading is reported as on the wire
    pub const INVALID_RAW_CM: f32 = -1.0;

    /// Status text with one decimal. Invalid readings render as
    /// [`Self::INVALID_RAW_CM`] so the field always parses as a number.
    pub fn status_text(&self) -> String {
        let cm = self.cm().unwrap_or(Self::INVALID_RAW_CM);
        format!("{:.1}", cm)
    }
}

impl fmt::Display for DistanceReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid(cm) => write!(f, "{:.1} cm", cm),
            Self::Invalid => write!(f, "invalid"),
        }
    }
}

/// Signed wheel duties, each clamped to `[-1.0, 1.0]`.
///
/// Sign is direction, magnitude is the fraction of full drive. Stopping is
/// not a zero command: use `MotionActuator::stop` so the driver can coast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionCommand {
    pub left: f32,
    pub right: f32,
}

impl MotionCommand {
    /// Build a command, clamping both duties into range
    pub fn new(left: f32, right: f32) -> Self {
        Self {
            left: clamp_duty(left),
            right: clamp_duty(right),
        }
    }

    /// Both wheels forward at `speed`
    pub fn forward(speed: f32) -> Self {
        Self::new(speed, speed)
    }

    /// Both wheels backward at `speed`
    pub fn reverse(speed: f32) -> Self {
        Self::new(-speed, -speed)
    }

    /// Clockwise spin in place: left forward, right backward
    pub fn pivot_right(speed: f32) -> Self {
        Self::new(speed, -speed)
    }

    /// Counter-clockwise spin in place: left backward, right forward
    pub fn pivot_left(speed: f32) -> Self {
        Self::new(-speed, speed)
    }
}

fn clamp_duty(duty: f32) -> f32 {
    if duty.is_nan() {
        0.0
    } else {
        duty.clamp(-1.0, 1.0)
    }
}

/// Operator-selected mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingMode {
    Work,
    Pause,
}

impl OperatingMode {
    /// Label used on the status endpoint
    pub fn label(&self) -> &'static str {
        match self {
            Self::Work => "WORK",
            Self::Pause => "PAUSE",
        }
    }

    /// The other mode
    pub fn toggled(&self) -> Self {
        match self {
            Self::Work => Self::Pause,
            Self::Pause => Self::Work,
        }
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one escape maneuver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeDecision {
    /// Path to the right is open; robot is left facing right
    ClearRight,
    /// Path to the left is open; robot is left facing left
    ClearLeft,
    /// Both sides blocked; robot pivoted back toward the original heading
    Trapped,
}

impl fmt::Display for EscapeDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ClearRight => "clear right",
            Self::ClearLeft => "clear left",
            Self::Trapped => "trapped",
        };
        f.write_str(s)
    }
}

/// RGB indicator colour, 16-bit duty per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u16,
    pub g: u16,
    pub b: u16,
}

impl Rgb {
    pub const OFF: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(u16::MAX, u16::MAX, u16::MAX);
    pub const RED: Rgb = Rgb::new(u16::MAX, 0, 0);
    pub const GREEN: Rgb = Rgb::new(0, u16::MAX, 0);
    pub const AMBER: Rgb = Rgb::new(u16::MAX, 0x7FFF, 0);

    pub const fn new(r: u16, g: u16, b: u16) -> Self {
        Self { r, g, b }
    }
}
