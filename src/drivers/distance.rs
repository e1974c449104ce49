//! Distance sensor driver trait

use crate::core::types::DistanceReading;
use crate::error::Result;

/// Forward-facing range sensor
pub trait DistanceSource: Send {
    /// Trigger one measurement and return it.
    ///
    /// Timeouts and missing echoes are reported as
    /// [`DistanceReading::Invalid`], not as errors. `Err` is reserved for a
    /// driver that can no longer talk to the sensor at all.
    fn trigger_and_read(&mut self) -> Result<DistanceReading>;

    /// Drive the sensor's own status LED, if it has one
    fn set_indicator(&mut self, _on: bool) -> Result<()> {
        Ok(())
    }
}
