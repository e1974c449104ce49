//! Core data types shared by the controller, drivers and the command channel.
//!
//! - [`types`]: distance readings, motion commands, modes and decisions

pub mod types;
