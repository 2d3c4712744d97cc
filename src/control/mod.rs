// src/control/mod.rs

//! Control protocol between the supervisor and its runner.
//!
//! The runner talks back over a loopback TCP connection whose address it
//! finds in `DEVSUP_CONTROL_ADDR`. Each line is one JSON [`ControlMessage`].
//! Delivery is at-most-once: nothing is acknowledged or retried, and a
//! message cut off by the child's death is simply lost.

pub mod channel;
pub mod message;

pub use channel::{CONTROL_ADDR_ENV, ControlChannel};
pub use message::ControlMessage;
