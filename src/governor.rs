//! Speed governance: distance bands plus fatigue derating.
//!
//! | Reading | WORK command |
//! |---------|--------------|
//! | valid, `< stop_distance` | escape |
//! | valid, `< slow_down_distance` | forward at `slow_speed * derate_ratio` |
//! | valid and farther, or invalid | forward at `effective_max` |
//!
//! An invalid reading is treated as a clear path. The robot keeps moving
//! through sensor dropouts instead of stopping. PAUSE always stops.

use crate::config::GovernorConfig;
use crate::core::types::{DistanceReading, MotionCommand, OperatingMode};

/// What the control loop should do this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Governance {
    /// Issue an explicit stop
    Stop,
    /// Drive with this command
    Drive(MotionCommand),
    /// Obstacle too close: run the escape maneuver
    Escape,
}

/// Computes the per-tick motion decision
#[derive(Debug, Clone)]
pub struct SpeedGovernor {
    config: GovernorConfig,
}

impl SpeedGovernor {
    pub fn new(config: GovernorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.config
    }

    /// Maximum forward duty after fatigue derating.
    ///
    /// Derating depends only on the session timer, so it holds until the
    /// timer is reset by re-entering WORK.
    pub fn effective_max(&self, fatigue_s: f32) -> f32 {
        if fatigue_s > self.config.fatigue_threshold_s {
            self.config.max_speed * self.config.fatigue_derate
        } else {
            self.config.max_speed
        }
    }

    /// `effective_max / max_speed`
    pub fn derate_ratio(&self, fatigue_s: f32) -> f32 {
        self.effective_max(fatigue_s) / self.config.max_speed
    }

    pub fn decide(
        &self,
        mode: OperatingMode,
        fatigue_s: f32,
        distance: DistanceReading,
    ) -> Governance {
        if mode == OperatingMode::Pause {
            return Governance::Stop;
        }

        let effective_max = self.effective_max(fatigue_s);

        if distance.is_closer_than(self.config.stop_distance_cm) {
            Governance::Escape
        } else if distance.is_closer_than(self.config.slow_down_distance_cm) {
            let slow = self.config.slow_speed * (effective_max / self.config.max_speed);
            Governance::Drive(MotionCommand::forward(slow))
        } else {
            Governance::Drive(MotionCommand::forward(effective_max))
        }
    }
}
