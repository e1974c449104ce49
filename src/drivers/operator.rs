//! Operator panel driver trait (work/pause button and RGB indicator)

use crate::core::types::Rgb;
use crate::error::Result;

/// Physical operator controls
pub trait OperatorPanel: Send {
    /// Instantaneous button level (true while held)
    fn button_pressed(&mut self) -> Result<bool>;

    /// Set the status indicator colour
    fn set_indicator(&mut self, color: Rgb) -> Result<()>;
}
