//! Obstacle escape maneuver.
//!
//! The maneuver is an open-loop sequence of [`TimedSegment`]s. Heading is
//! never measured: a "90°" pivot is simply `turn_90_duration` at
//! `turn_speed`, so the result drifts with battery level, floor friction and
//! any asymmetry between the two motors. Closed-loop heading control would
//! need odometry this chassis does not have.
//!
//! # Sequence
//!
//! ```text
//! stop
//! reverse  (-0.7, -0.7) 0.75s   -> sample
//! stop     settle      0.30s    -> sample
//! pivot R  (+t, -t)    T90      -> sample
//! stop     settle      0.50s    -> sample = right
//!   right invalid or > clearance  => ClearRight (facing right)
//! pivot L  (-t, +t)    2*T90    -> sample
//! stop     settle      0.50s    -> sample = left
//!   left invalid or > clearance   => ClearLeft (facing left)
//! pivot R  (+t, -t)    T90      -> sample, stop  => Trapped
//! ```
//!
//! The whole sequence blocks the control loop (about 4.5 s worst case with
//! default tuning) and cannot be cancelled once started.

use crate::clock::Clock;
use crate::config::{EscapeConfig, secs};
use crate::core::types::{DistanceReading, EscapeDecision, MotionCommand};
use crate::drivers::{DistanceSource, MotionActuator};
use crate::error::Result;
use std::time::Duration;

/// What the wheels do during a segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentAction {
    Drive(MotionCommand),
    Stop,
}

/// One fixed-duration step of an open-loop maneuver
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedSegment {
    pub label: &'static str,
    pub action: SegmentAction,
    pub duration: Duration,
}

impl TimedSegment {
    pub fn drive(label: &'static str, command: MotionCommand, duration: Duration) -> Self {
        Self {
            label,
            action: SegmentAction::Drive(command),
            duration,
        }
    }

    pub fn settle(label: &'static str, duration: Duration) -> Self {
        Self {
            label,
            action: SegmentAction::Stop,
            duration,
        }
    }
}

/// Exclusive access to actuator, sensor and time for one maneuver
pub struct ManeuverIo<'a> {
    pub motors: &'a mut dyn MotionActuator,
    pub ranger: &'a mut dyn DistanceSource,
    pub clock: &'a dyn Clock,
}

impl ManeuverIo<'_> {
    /// Apply the segment, wait it out, then take a fresh sample
    fn execute(&mut self, segment: &TimedSegment) -> Result<DistanceReading> {
        match segment.action {
            SegmentAction::Drive(cmd) => self.motors.drive(cmd)?,
            SegmentAction::Stop => self.motors.stop()?,
        }
        self.clock.sleep(segment.duration);
        let reading = self.ranger.trigger_and_read()?;
        log::debug!(
            "Escape: {} ({} ms) -> {}",
            segment.label,
            segment.duration.as_millis(),
            reading
        );
        Ok(reading)
    }

    fn execute_all(&mut self, segments: &[TimedSegment]) -> Result<DistanceReading> {
        let mut last = DistanceReading::Invalid;
        for segment in segments {
            last = self.execute(segment)?;
        }
        Ok(last)
    }
}

/// Result of one escape run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EscapeOutcome {
    pub decision: EscapeDecision,
    pub right: DistanceReading,
    /// Only sampled when the right side was blocked
    pub left: Option<DistanceReading>,
    /// Most recent sample taken, for the status endpoint
    pub last_reading: DistanceReading,
}

/// Reverse-and-look escape routine
#[derive(Debug, Clone)]
pub struct EscapeManeuver {
    config: EscapeConfig,
}

impl EscapeManeuver {
    pub fn new(config: EscapeConfig) -> Self {
        Self { config }
    }

    fn turn_90(&self) -> Duration {
        secs(self.config.turn_90_duration_s)
    }

    /// Back away from the obstacle
    pub fn backoff_segments(&self) -> [TimedSegment; 2] {
        [
            TimedSegment::drive(
                "reverse",
                MotionCommand::reverse(self.config.reverse_speed),
                secs(self.config.reverse_duration_s),
            ),
            TimedSegment::settle("settle after reverse", secs(self.config.reverse_settle_s)),
        ]
    }

    /// Quarter turn clockwise, then settle for the right-hand sample
    pub fn look_right_segments(&self) -> [TimedSegment; 2] {
        [
            TimedSegment::drive(
                "pivot right",
                MotionCommand::pivot_right(self.config.turn_speed),
                self.turn_90(),
            ),
            TimedSegment::settle("settle facing right", secs(self.config.turn_settle_s)),
        ]
    }

    /// Half turn counter-clockwise, then settle for the left-hand sample
    pub fn look_left_segments(&self) -> [TimedSegment; 2] {
        [
            TimedSegment::drive(
                "pivot left",
                MotionCommand::pivot_left(self.config.turn_speed),
                self.turn_90() * 2,
            ),
            TimedSegment::settle("settle facing left", secs(self.config.turn_settle_s)),
        ]
    }

    /// Quarter turn clockwise back toward the original heading
    pub fn turn_back_segment(&self) -> TimedSegment {
        TimedSegment::drive(
            "pivot back",
            MotionCommand::pivot_right(self.config.turn_speed),
            self.turn_90(),
        )
    }

    /// A side is open when nothing echoes back or the echo is beyond clearance
    pub fn is_open(&self, reading: DistanceReading) -> bool {
        match reading {
            DistanceReading::Invalid => true,
            DistanceReading::Valid(cm) => cm > self.config.clearance_cm,
        }
    }

    /// Worst-case blocking time of one run (all branches taken)
    pub fn worst_case_duration(&self) -> Duration {
        self.backoff_segments()
            .iter()
            .chain(self.look_right_segments().iter())
            .chain(self.look_left_segments().iter())
            .map(|s| s.duration)
            .sum::<Duration>()
            + self.turn_back_segment().duration
    }

    /// Run the maneuver to a decision. Blocks for its full duration.
    pub fn run(&self, io: &mut ManeuverIo<'_>) -> Result<EscapeOutcome> {
        log::info!("Obstacle detected, finding escape route");
        io.motors.stop()?;

        io.execute_all(&self.backoff_segments())?;

        let right = io.execute_all(&self.look_right_segments())?;
        log::info!("Escape: checking right: {}", right);
        if self.is_open(right) {
            log::info!("Escape decision: path right is clear");
            return Ok(EscapeOutcome {
                decision: EscapeDecision::ClearRight,
                right,
                left: None,
                last_reading: right,
            });
        }

        let left = io.execute_all(&self.look_left_segments())?;
        log::info!("Escape: checking left: {}", left);
        if self.is_open(left) {
            log::info!("Escape decision: path left is clear");
            return Ok(EscapeOutcome {
                decision: EscapeDecision::ClearLeft,
                right,
                left: Some(left),
                last_reading: left,
            });
        }

        log::info!("Escape decision: trapped, turning back");
        let last_reading = io.execute(&self.turn_back_segment())?;
        io.motors.stop()?;

        Ok(EscapeOutcome {
            decision: EscapeDecision::Trapped,
            right,
            left: Some(left),
            last_reading,
        })
    }
}
