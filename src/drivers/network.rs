//! Network uplink driver trait

use crate::error::Result;

/// Station-mode network bring-up (Wi-Fi on the robot, a no-op on hosts)
pub trait NetworkLink: Send {
    /// Join the network.
    ///
    /// Returns the assigned address, or `None` when the link could not be
    /// established. `None` is not fatal: the controller runs offline.
    fn connect(&mut self, ssid: &str, password: &str) -> Result<Option<String>>;
}
