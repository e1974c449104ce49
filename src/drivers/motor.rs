//! Motor driver trait

use crate::core::types::MotionCommand;
use crate::error::Result;

/// Two independently driven wheels
pub trait MotionActuator: Send {
    /// Drive both wheels at the given signed duties
    fn drive(&mut self, command: MotionCommand) -> Result<()>;

    /// Stop both wheels.
    ///
    /// Distinct from `drive` with zero duty: a driver may release the
    /// H-bridge (coast) here instead of actively holding zero.
    fn stop(&mut self) -> Result<()>;
}
