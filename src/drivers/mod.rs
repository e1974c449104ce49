//! Device driver traits
//!
//! The controller only talks to hardware through these seams. Board
//! specific implementations live under [`crate::devices`].

pub mod distance;
pub mod motor;
pub mod network;
pub mod operator;

pub use distance::DistanceSource;
pub use motor::MotionActuator;
pub use network::NetworkLink;
pub use operator::OperatorPanel;
