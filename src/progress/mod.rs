//! Push-based progress delivery.
//!
//! One reconnecting WebSocket connection per job id, with typed events
//! fanned out to subscribers.

pub mod channel;

pub use channel::{ChannelConfig, ProgressChannel};
