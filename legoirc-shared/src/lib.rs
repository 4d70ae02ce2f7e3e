#![cfg_attr(not(test), no_std)]

pub mod decoder;
pub mod protocol;
pub mod timing;

pub use decoder::Decoder;
pub use protocol::{encode, Channel, Direction, Message, Mode, Steering, Throttle, Unsupported};
pub use timing::Timing;
