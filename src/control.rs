//! Control loop and supervision.
//!
//! # Lifecycle
//!
//! ```text
//! Init -> SelfCheck -> FailHalt
//!                   -> NetworkConnect -> Running -> Stopped
//! ```
//!
//! `Running` is the only long-lived state. On the robot nothing ever clears
//! the running flag; `Stopped` is only reached on a host when the process is
//! signalled.
//!
//! # Tick
//!
//! 1. Poll the operator button (may toggle the mode)
//! 2. Sample the ranger and record the reading
//! 3. Govern: stop, drive, or run the escape maneuver to completion
//! 4. Serve at most one pending command channel request
//!
//! Any error in a tick is contained by [`ControlLoop::step`]: it is logged,
//! the wheels are stopped, and the loop sleeps for the [`RetryPolicy`]
//! cooldown before the next tick. The loop itself never ends on a failed
//! tick.

use crate::channel::{CommandChannel, Route};
use crate::clock::Clock;
use crate::config::{ChalakConfig, ControlConfig, secs};
use crate::core::types::{DistanceReading, EscapeDecision, MotionCommand, OperatingMode};
use crate::drivers::{DistanceSource, MotionActuator};
use crate::error::Result;
use crate::governor::{Governance, SpeedGovernor};
use crate::maneuver::{EscapeManeuver, ManeuverIo};
use crate::operator::OperatorInterface;
use crate::state::RobotState;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Process lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Init,
    SelfCheck,
    FailHalt,
    NetworkConnect,
    Running,
    Stopped,
}

impl Lifecycle {
    /// Move to `next`, logging the transition
    pub fn advance(&mut self, next: Lifecycle) {
        log::info!("Lifecycle: {} -> {}", self, next);
        *self = next;
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "INIT",
            Self::SelfCheck => "SELF_CHECK",
            Self::FailHalt => "FAIL_HALT",
            Self::NetworkConnect => "NETWORK_CONNECT",
            Self::Running => "RUNNING",
            Self::Stopped => "STOPPED",
        };
        f.write_str(name)
    }
}

/// Cooldown schedule after failed ticks.
///
/// The cooldown starts at `cooldown_s`, grows by `backoff_factor` per
/// consecutive failure up to `max_cooldown_s`, and resets after the first
/// good tick. There is no retry cap.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    base_s: f32,
    max_s: f32,
    factor: f32,
    consecutive: u32,
}

impl RetryPolicy {
    pub fn new(base_s: f32, max_s: f32, factor: f32) -> Self {
        Self {
            base_s,
            max_s,
            factor,
            consecutive: 0,
        }
    }

    pub fn from_config(config: &ControlConfig) -> Self {
        Self::new(config.cooldown_s, config.max_cooldown_s, config.backoff_factor)
    }

    /// Cooldown the next failure would get
    pub fn next_cooldown(&self) -> Duration {
        let exp = self.consecutive.min(i32::MAX as u32) as i32;
        let s = (self.base_s * self.factor.powi(exp)).min(self.max_s);
        secs(s)
    }

    /// Record a failure and return the cooldown to wait
    pub fn on_failure(&mut self) -> Duration {
        let cooldown = self.next_cooldown();
        self.consecutive = self.consecutive.saturating_add(1);
        cooldown
    }

    pub fn on_success(&mut self) {
        if self.consecutive > 0 {
            log::info!("Recovered after {} failed tick(s)", self.consecutive);
        }
        self.consecutive = 0;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive
    }
}

/// What the wheels were told to do in a tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickAction {
    Stopped,
    Drove(MotionCommand),
    Escaped(EscapeDecision),
}

/// Summary of one successful tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    /// Mode the governor acted on
    pub mode: OperatingMode,
    /// Last reading after the tick (the final escape sample if one ran)
    pub distance: DistanceReading,
    pub fatigue_s: f32,
    pub action: TickAction,
    pub route: Option<Route>,
}

pub struct ControlLoop {
    ranger: Box<dyn DistanceSource>,
    motors: Box<dyn MotionActuator>,
    hri: OperatorInterface,
    channel: Option<CommandChannel>,
    state: RobotState,
    governor: SpeedGovernor,
    maneuver: EscapeManeuver,
    retry: RetryPolicy,
    tick_period: Duration,
    clock: Arc<dyn Clock>,
    ticks: u64,
    failed_ticks: u64,
}

impl ControlLoop {
    pub fn new(
        config: &ChalakConfig,
        ranger: Box<dyn DistanceSource>,
        motors: Box<dyn MotionActuator>,
        hri: OperatorInterface,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let state = RobotState::new(config.control.initial_mode, clock.now());
        Self {
            ranger,
            motors,
            hri,
            channel: None,
            state,
            governor: SpeedGovernor::new(config.governor.clone()),
            maneuver: EscapeManeuver::new(config.escape.clone()),
            retry: RetryPolicy::from_config(&config.control),
            tick_period: config.tick_period(),
            clock,
            ticks: 0,
            failed_ticks: 0,
        }
    }

    /// Attach the command channel (absent when running offline)
    pub fn with_channel(mut self, channel: CommandChannel) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn state(&self) -> &RobotState {
        &self.state
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn failed_ticks(&self) -> u64 {
        self.failed_ticks
    }

    /// One control iteration, without failure containment
    pub fn run_one_tick(&mut self) -> Result<TickReport> {
        let now = self.clock.now();
        self.hri.update(&mut self.state, now)?;

        let distance = self.ranger.trigger_and_read()?;
        self.state.record_distance(distance);

        let mode = self.state.mode();
        let fatigue_s = self.state.fatigue_seconds(now);

        let action = match self.governor.decide(mode, fatigue_s, distance) {
            Governance::Stop => {
                self.motors.stop()?;
                TickAction::Stopped
            }
            Governance::Drive(cmd) => {
                log::debug!("Drive {:?} (distance {}, fatigue {:.1}s)", cmd, distance, fatigue_s);
                self.motors.drive(cmd)?;
                TickAction::Drove(cmd)
            }
            Governance::Escape => {
                log::debug!("Obstacle at {}", distance);
                let mut io = ManeuverIo {
                    motors: self.motors.as_mut(),
                    ranger: self.ranger.as_mut(),
                    clock: self.clock.as_ref(),
                };
                let outcome = self.maneuver.run(&mut io)?;
                self.state.record_distance(outcome.last_reading);
                TickAction::Escaped(outcome.decision)
            }
        };

        let route = match self.channel.as_mut() {
            Some(channel) => {
                let now = self.clock.now();
                channel.poll(&mut self.state, self.motors.as_mut(), now)?
            }
            None => None,
        };

        self.ticks += 1;
        Ok(TickReport {
            mode,
            distance: self.state.last_distance(),
            fatigue_s,
            action,
            route,
        })
    }

    /// One supervised iteration: tick, then either the tick period or the
    /// failure cooldown.
    pub fn step(&mut self) -> Option<TickReport> {
        match self.run_one_tick() {
            Ok(report) => {
                self.retry.on_success();
                if !self.tick_period.is_zero() {
                    self.clock.sleep(self.tick_period);
                }
                Some(report)
            }
            Err(e) => {
                self.failed_ticks += 1;
                log::error!("Main loop error: {}", e);
                if let Err(stop_err) = self.motors.stop() {
                    log::error!("Stop after failed tick also failed: {}", stop_err);
                }
                let cooldown = self.retry.on_failure();
                log::warn!("Cooling down for {:.1}s", cooldown.as_secs_f32());
                self.clock.sleep(cooldown);
                None
            }
        }
    }

    /// Run until `running` is cleared, then stop the wheels
    pub fn run(&mut self, running: &AtomicBool) -> Result<()> {
        while running.load(Ordering::SeqCst) {
            self.step();
        }
        log::info!(
            "Control loop exiting after {} ticks ({} failed)",
            self.ticks,
            self.failed_ticks
        );
        self.motors.stop()
    }
}
