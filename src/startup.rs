//! Power-on self-check.
//!
//! Runs once before the control loop. The ranger is sampled twice with a
//! settle delay in between (the first echo after power-up is unreliable) and
//! only the second sample is judged. The check fails if the operator is
//! holding the button, the ranger returned no echo, or the ranger driver
//! reported a fault on either sample.
//!
//! On PASS both indicators flash white at `pass_flash_hz` for
//! `pass_window_ms`, so an operator sees the robot go live. On FAIL the HRI
//! indicator flashes red until the process is stopped; the robot never
//! becomes mobile.
//!
//! Network bring-up follows a passed check. A failed join is not fatal: the
//! controller runs offline without the command channel.

use crate::clock::Clock;
use crate::config::{NetworkConfig, StartupConfig};
use crate::core::types::{DistanceReading, Rgb};
use crate::drivers::{DistanceSource, NetworkLink};
use crate::error::Result;
use crate::operator::OperatorInterface;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Why the self-check refused to arm the robot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailReason {
    ButtonHeld,
    NoEcho,
    SensorFault,
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ButtonHeld => write!(f, "button held at boot"),
            Self::NoEcho => write!(f, "no echo from range sensor"),
            Self::SensorFault => write!(f, "range sensor fault"),
        }
    }
}

/// Self-check result
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateVerdict {
    /// Carries the judged reading
    Pass(DistanceReading),
    Fail(FailReason),
}

impl GateVerdict {
    pub fn passed(&self) -> bool {
        matches!(self, Self::Pass(_))
    }
}

pub struct StartupGate {
    config: StartupConfig,
}

impl StartupGate {
    pub fn new(config: StartupConfig) -> Self {
        Self { config }
    }

    /// Sample, judge, and flash the PASS pattern if the check succeeds.
    ///
    /// A ranger driver error is a FAIL verdict, not an `Err`, so the caller
    /// still reaches [`halt`](Self::halt). Does not flash on FAIL.
    pub fn check(
        &self,
        ranger: &mut dyn DistanceSource,
        hri: &mut OperatorInterface,
        clock: &dyn Clock,
    ) -> Result<GateVerdict> {
        log::info!("Performing system check...");

        let cold = ranger.trigger_and_read();
        clock.sleep(Duration::from_millis(self.config.sensor_settle_ms));
        let judged = ranger.trigger_and_read();
        let button = hri.button_pressed()?;

        let reading = match (cold, judged) {
            (Ok(cold), Ok(reading)) => {
                log::debug!("Self-check: cold sample {}, judged sample {}", cold, reading);
                Some(reading)
            }
            (Err(e), _) | (_, Err(e)) => {
                log::error!("Range sensor fault during self-check: {}", e);
                None
            }
        };

        let verdict = match reading {
            _ if button => GateVerdict::Fail(FailReason::ButtonHeld),
            None => GateVerdict::Fail(FailReason::SensorFault),
            Some(r) if !r.is_valid() => GateVerdict::Fail(FailReason::NoEcho),
            Some(r) => GateVerdict::Pass(r),
        };

        match verdict {
            GateVerdict::Pass(reading) => {
                log::info!("System check PASSED ({})", reading);
                self.flash_pass(ranger, hri, clock)?;
            }
            GateVerdict::Fail(reason) => log::error!("System check FAILED: {}", reason),
        }
        Ok(verdict)
    }

    /// Half of one PASS flash cycle
    pub fn pass_half_period(&self) -> Duration {
        let hz = u64::from(self.config.pass_flash_hz.max(1));
        Duration::from_micros(500_000 / hz)
    }

    fn flash_pass(
        &self,
        ranger: &mut dyn DistanceSource,
        hri: &mut OperatorInterface,
        clock: &dyn Clock,
    ) -> Result<()> {
        let half = self.pass_half_period();
        let end = clock.now() + Duration::from_millis(self.config.pass_window_ms);

        while clock.now() < end {
            hri.set_indicator(Rgb::WHITE)?;
            ranger.set_indicator(true)?;
            clock.sleep(half);
            hri.set_indicator(Rgb::OFF)?;
            ranger.set_indicator(false)?;
            clock.sleep(half);
        }
        Ok(())
    }

    /// Flash red until `running` is cleared.
    ///
    /// On the robot nothing clears the flag, so this never returns and a
    /// power cycle is the only way out.
    pub fn halt(
        &self,
        hri: &mut OperatorInterface,
        running: &AtomicBool,
        clock: &dyn Clock,
    ) -> Result<()> {
        let half = Duration::from_millis(self.config.fail_flash_period_ms / 2);
        log::error!("Halting. Restart required.");

        while running.load(Ordering::SeqCst) {
            hri.set_indicator(Rgb::RED)?;
            clock.sleep(half);
            hri.set_indicator(Rgb::OFF)?;
            clock.sleep(half);
        }
        Ok(())
    }
}

/// Join the configured network. Returns the address, or `None` to run offline.
pub fn connect_network(link: &mut dyn NetworkLink, config: &NetworkConfig) -> Option<String> {
    log::info!("Connecting to {}...", config.wifi_ssid);
    match link.connect(&config.wifi_ssid, &config.wifi_password) {
        Ok(Some(address)) => {
            log::info!("Connected. IP address: {}", address);
            Some(address)
        }
        Ok(None) => {
            log::warn!("Network connection failed, continuing offline");
            None
        }
        Err(e) => {
            log::warn!("Network error ({}), continuing offline", e);
            None
        }
    }
}
