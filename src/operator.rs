//! Operator interface: work/pause button and mode indicator.
//!
//! A released-to-pressed edge on the button toggles the mode through
//! [`RobotState::toggle_mode`], the same mutation the `/hri_toggle` route
//! uses, so the two inputs can never disagree. The first read after boot
//! only establishes the baseline level. A press edge that arrives within
//! the debounce window of the previous toggle is contact bounce and is
//! ignored.

use crate::core::types::{OperatingMode, Rgb};
use crate::drivers::OperatorPanel;
use crate::error::Result;
use crate::state::RobotState;
use std::time::Duration;

/// Indicator colour for a mode
pub fn mode_color(mode: OperatingMode) -> Rgb {
    match mode {
        OperatingMode::Work => Rgb::GREEN,
        OperatingMode::Pause => Rgb::AMBER,
    }
}

/// Button edge detection and indicator ownership
pub struct OperatorInterface {
    panel: Box<dyn OperatorPanel>,
    last_level: Option<bool>,
    last_toggle: Option<Duration>,
    debounce: Duration,
    shown: Option<Rgb>,
}

impl OperatorInterface {
    pub fn new(panel: Box<dyn OperatorPanel>) -> Self {
        Self {
            panel,
            last_level: None,
            last_toggle: None,
            debounce: Duration::ZERO,
            shown: None,
        }
    }

    /// Ignore press edges within `window` of the last toggle
    pub fn with_debounce(mut self, window: Duration) -> Self {
        self.debounce = window;
        self
    }

    /// Instantaneous button level, without edge handling
    pub fn button_pressed(&mut self) -> Result<bool> {
        self.panel.button_pressed()
    }

    /// Poll the button, toggle on a press edge, refresh the indicator.
    ///
    /// Returns true when this call toggled the mode.
    pub fn update(&mut self, state: &mut RobotState, now: Duration) -> Result<bool> {
        let level = self.panel.button_pressed()?;
        let edge = self.last_level == Some(false) && level;
        self.last_level = Some(level);

        let bouncing = self
            .last_toggle
            .is_some_and(|at| now.saturating_sub(at) < self.debounce);
        if edge && bouncing {
            log::debug!("Ignoring button bounce at {:?}", now);
        }
        let pressed = edge && !bouncing;

        if pressed {
            self.last_toggle = Some(now);
            log::info!("Button pressed");
            state.toggle_mode(now);
        }
        self.show_mode(state.mode())?;
        Ok(pressed)
    }

    /// Show the mode colour, touching the hardware only on change
    pub fn show_mode(&mut self, mode: OperatingMode) -> Result<()> {
        let color = mode_color(mode);
        if self.shown != Some(color) {
            self.set_indicator(color)?;
        }
        Ok(())
    }

    pub fn set_indicator(&mut self, color: Rgb) -> Result<()> {
        self.panel.set_indicator(color)?;
        self.shown = Some(color);
        Ok(())
    }
}
