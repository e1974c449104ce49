//! Mock devices for hardware-free runs and tests
//!
//! Two families live here:
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`SimRanger`], [`SimMotors`], [`SimPanel`], [`SimLink`] | Kinematic simulation behind `[device] type = "mock"` |
//! | [`ScriptedRanger`], [`RecordingMotors`], [`ScriptedPanel`], [`ScriptedLink`] | Deterministic doubles for tests |
//!
//! # Simulation
//!
//! The simulated rover sits in an empty rectangular room. Wheel duties feed
//! differential-drive kinematics; the ranger ray-casts to the nearest wall
//! ahead, adds Gaussian noise and occasionally drops an echo.
//!
//! ```toml
//! [device]
//! type = "mock"
//!
//! [simulation]
//! room_width_cm = 300.0
//! room_height_cm = 200.0
//! dropout_probability = 0.02
//! random_seed = 42      # 0 = random each run
//! ```
//!
//! All clones of the scripted doubles share state, so a test can hand one
//! copy to the controller and inspect the other.

mod noise;
mod scripted;
mod world;

pub use scripted::{MotorEvent, RecordingMotors, ScriptedLink, ScriptedPanel, ScriptedRanger};
pub use world::SimWorld;

use crate::clock::Clock;
use crate::config::SimulationConfig;
use crate::core::types::{DistanceReading, MotionCommand, Rgb};
use crate::devices::Hardware;
use crate::drivers::{DistanceSource, MotionActuator, NetworkLink, OperatorPanel};
use crate::error::Result;
use noise::RangeNoise;
use parking_lot::Mutex;
use std::sync::Arc;

type SharedWorld = Arc<Mutex<SimWorld>>;

/// Build the full simulated hardware set
pub fn create_simulated(config: &SimulationConfig, clock: Arc<dyn Clock>) -> Hardware {
    let world: SharedWorld = Arc::new(Mutex::new(SimWorld::new(config, clock.now())));
    log::info!(
        "Simulation: {:.0}x{:.0} cm room, start ({:.0}, {:.0}) heading {:.0}°",
        config.room_width_cm,
        config.room_height_cm,
        config.start_x_cm,
        config.start_y_cm,
        config.start_heading_deg
    );

    Hardware {
        ranger: Box::new(SimRanger::new(Arc::clone(&world), Arc::clone(&clock), config)),
        motors: Box::new(SimMotors::new(world, clock)),
        panel: Box::new(SimPanel::new(config.button_held_at_boot)),
        link: Box::new(SimLink {
            offline: config.offline,
        }),
    }
}

/// Simulated ultrasonic ranger
pub struct SimRanger {
    world: SharedWorld,
    clock: Arc<dyn Clock>,
    noise: RangeNoise,
    max_range_cm: f32,
    led_on: bool,
}

impl SimRanger {
    pub fn new(world: SharedWorld, clock: Arc<dyn Clock>, config: &SimulationConfig) -> Self {
        Self {
            world,
            clock,
            noise: RangeNoise::new(
                config.random_seed,
                config.range_noise_cm,
                config.dropout_probability,
            ),
            max_range_cm: config.max_range_cm,
            led_on: false,
        }
    }
}

impl DistanceSource for SimRanger {
    fn trigger_and_read(&mut self) -> Result<DistanceReading> {
        let range = {
            let mut world = self.world.lock();
            world.advance_to(self.clock.now());
            world.range_ahead()
        };

        if self.noise.dropped() || range > self.max_range_cm {
            return Ok(DistanceReading::Invalid);
        }
        Ok(DistanceReading::from_raw_cm(self.noise.perturb(range)))
    }

    fn set_indicator(&mut self, on: bool) -> Result<()> {
        if on != self.led_on {
            log::trace!("SimRanger: led {}", if on { "on" } else { "off" });
            self.led_on = on;
        }
        Ok(())
    }
}

/// Simulated dual motor driver
pub struct SimMotors {
    world: SharedWorld,
    clock: Arc<dyn Clock>,
}

impl SimMotors {
    pub fn new(world: SharedWorld, clock: Arc<dyn Clock>) -> Self {
        Self { world, clock }
    }
}

impl MotionActuator for SimMotors {
    fn drive(&mut self, command: MotionCommand) -> Result<()> {
        self.world
            .lock()
            .set_duties(command.left, command.right, self.clock.now());
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.world.lock().set_duties(0.0, 0.0, self.clock.now());
        Ok(())
    }
}

/// Simulated operator panel. The button is either held from boot or never pressed.
pub struct SimPanel {
    button_held: bool,
    color: Rgb,
}

impl SimPanel {
    pub fn new(button_held: bool) -> Self {
        Self {
            button_held,
            color: Rgb::OFF,
        }
    }
}

impl OperatorPanel for SimPanel {
    fn button_pressed(&mut self) -> Result<bool> {
        Ok(self.button_held)
    }

    fn set_indicator(&mut self, color: Rgb) -> Result<()> {
        if color != self.color {
            log::trace!("SimPanel: indicator {:?}", color);
            self.color = color;
        }
        Ok(())
    }
}

/// Simulated uplink
pub struct SimLink {
    offline: bool,
}

impl NetworkLink for SimLink {
    fn connect(&mut self, ssid: &str, _password: &str) -> Result<Option<String>> {
        if self.offline {
            log::debug!("SimLink: refusing to join {}", ssid);
            return Ok(None);
        }
        Ok(Some("127.0.0.1".to_string()))
    }
}
