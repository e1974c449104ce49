//! Device backends
//!
//! A backend provides one implementation of each driver trait, bundled as
//! [`Hardware`]. Only the host simulation (`mock`) ships with the crate;
//! board support packages plug in here.

pub mod mock;

use crate::clock::Clock;
use crate::config::ChalakConfig;
use crate::drivers::{DistanceSource, MotionActuator, NetworkLink, OperatorPanel};
use crate::error::{Error, Result};
use std::sync::Arc;

/// All external collaborators of the controller
pub struct Hardware {
    pub ranger: Box<dyn DistanceSource>,
    pub motors: Box<dyn MotionActuator>,
    pub panel: Box<dyn OperatorPanel>,
    pub link: Box<dyn NetworkLink>,
}

/// Instantiate the backend named in `[device] type`
pub fn create_device(config: &ChalakConfig, clock: Arc<dyn Clock>) -> Result<Hardware> {
    match config.device.device_type.as_str() {
        "mock" => {
            log::info!("Creating simulated device: {}", config.device.name);
            Ok(mock::create_simulated(&config.simulation, clock))
        }
        other => Err(Error::Config(format!("Unknown device type: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn test_unknown_device_type_is_rejected() {
        let mut config = ChalakConfig::default();
        config.device.device_type = "crl200s".to_string();
        let result = create_device(&config, Arc::new(ManualClock::new()));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_mock_device_is_created() {
        let config = ChalakConfig::default();
        assert!(create_device(&config, Arc::new(ManualClock::new())).is_ok());
    }
}
