//! Process-lifetime controller state.
//!
//! [`RobotState`] is the single owner of the operating mode, the fatigue
//! timer and the most recent distance reading. It is handed by `&mut` to the
//! pieces that need it within a tick, so there is exactly one writer.
//! A multi-threaded host would have to wrap it in one lock so governance and
//! the toggle route keep observing the same mode within a tick.

use crate::core::types::{DistanceReading, OperatingMode};
use std::time::Duration;

/// Continuous time spent in WORK since the mode was last entered
#[derive(Debug, Clone, Default)]
pub struct FatigueTimer {
    /// Clock time the current WORK session began
    session_start: Option<Duration>,
    /// Value held while paused
    frozen_s: f32,
}

impl FatigueTimer {
    fn start(&mut self, now: Duration) {
        self.session_start = Some(now);
        self.frozen_s = 0.0;
    }

    fn freeze(&mut self, now: Duration) {
        self.frozen_s = self.seconds(now);
        self.session_start = None;
    }

    /// Seconds of the current (or last, while paused) WORK session
    pub fn seconds(&self, now: Duration) -> f32 {
        match self.session_start {
            Some(start) => now.saturating_sub(start).as_secs_f32(),
            None => self.frozen_s,
        }
    }
}

/// Mode, fatigue and last reading, owned by the control loop
#[derive(Debug, Clone)]
pub struct RobotState {
    mode: OperatingMode,
    fatigue: FatigueTimer,
    last_distance: DistanceReading,
    toggles: u64,
}

impl RobotState {
    pub fn new(initial_mode: OperatingMode, now: Duration) -> Self {
        let mut fatigue = FatigueTimer::default();
        if initial_mode == OperatingMode::Work {
            fatigue.start(now);
        }
        Self {
            mode: initial_mode,
            fatigue,
            last_distance: DistanceReading::Invalid,
            toggles: 0,
        }
    }

    #[inline]
    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    /// Flip WORK/PAUSE and return the new mode.
    ///
    /// This is the only mode mutation; the physical button and the
    /// `/hri_toggle` route both end up here. Entering WORK restarts the
    /// fatigue timer from zero.
    pub fn toggle_mode(&mut self, now: Duration) -> OperatingMode {
        self.mode = self.mode.toggled();
        match self.mode {
            OperatingMode::Work => self.fatigue.start(now),
            OperatingMode::Pause => self.fatigue.freeze(now),
        }
        self.toggles += 1;
        log::info!("Mode -> {}", self.mode);
        self.mode
    }

    pub fn fatigue_seconds(&self, now: Duration) -> f32 {
        self.fatigue.seconds(now)
    }

    pub fn record_distance(&mut self, reading: DistanceReading) {
        self.last_distance = reading;
    }

    #[inline]
    pub fn last_distance(&self) -> DistanceReading {
        self.last_distance
    }

    /// Number of mode toggles since boot
    pub fn toggle_count(&self) -> u64 {
        self.toggles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const fn s(secs: u64) -> Duration {
        Duration::from_secs(secs)
    }

    #[test]
    fn test_double_toggle_restores_mode() {
        let mut state = RobotState::new(OperatingMode::Pause, s(0));
        state.toggle_mode(s(1));
        state.toggle_mode(s(1));
        assert_eq!(state.mode(), OperatingMode::Pause);
        assert_eq!(state.toggle_count(), 2);
    }

    #[test]
    fn test_fatigue_accumulates_in_work() {
        let state = RobotState::new(OperatingMode::Work, s(10));
        assert_eq!(state.fatigue_seconds(s(10)), 0.0);
        assert_eq!(state.fatigue_seconds(s(56)), 46.0);
    }

    #[test]
    fn test_fatigue_resets_on_work_reentry() {
        let mut state = RobotState::new(OperatingMode::Work, s(0));
        assert_eq!(state.fatigue_seconds(s(60)), 60.0);

        state.toggle_mode(s(60)); // PAUSE
        assert_eq!(state.fatigue_seconds(s(90)), 60.0);

        state.toggle_mode(s(90)); // WORK again
        assert_eq!(state.fatigue_seconds(s(90)), 0.0);
        assert_eq!(state.fatigue_seconds(s(100)), 10.0);
    }

    #[test]
    fn test_paused_start_has_no_fatigue() {
        let state = RobotState::new(OperatingMode::Pause, s(0));
        assert_eq!(state.fatigue_seconds(s(500)), 0.0);
    }

    #[test]
    fn test_last_distance_tracks_latest() {
        let mut state = RobotState::new(OperatingMode::Pause, s(0));
        assert_eq!(state.last_distance(), DistanceReading::Invalid);
        state.record_distance(DistanceReading::Valid(33.0));
        assert_eq!(state.last_distance(), DistanceReading::Valid(33.0));
    }
}
