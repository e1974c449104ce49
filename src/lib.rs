//! Chalak - onboard controller for a two-wheel obstacle-avoiding rover
//!
//! The controller runs a single cooperative loop: read the operator button
//! and the forward ranger, let the [`governor::SpeedGovernor`] pick a wheel
//! command (or run the [`maneuver::EscapeManeuver`]), then serve at most one
//! request on the HTTP [`channel::CommandChannel`].
//!
//! Hardware is reached only through the [`drivers`] traits. The `mock`
//! backend simulates the rover in a rectangular room for hardware-free runs.

pub mod channel;
pub mod clock;
pub mod config;
pub mod control;
pub mod core;
pub mod devices;
pub mod drivers;
pub mod error;
pub mod governor;
pub mod maneuver;
pub mod operator;
pub mod startup;
pub mod state;

// Re-export commonly used types
pub use config::ChalakConfig;
pub use control::{ControlLoop, Lifecycle, TickAction, TickReport};
pub use crate::core::types::{DistanceReading, EscapeDecision, MotionCommand, OperatingMode, Rgb};
pub use error::{Error, Result};
