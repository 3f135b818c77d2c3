//! Subscriber contracts - BroadcastHub / CommandRelay connection interface
//!
//! The transport (WebSocket, in-memory channel) is hidden behind two traits:
//! one per direction, so send and receive loops can own their half
//! independently.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ContractError;

/// What a subscriber receives and at which cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriberRole {
    /// Telemetry snapshot (`/ws/data`)
    Data,
    /// Encoded frames (`/ws/image`)
    Image,
    /// Bridge state (`/ws/control`)
    Control,
    /// Bridge state at high rate (`/ws/ros_teleop_bridge`)
    Bridge,
}

impl SubscriberRole {
    pub const ALL: [SubscriberRole; 4] = [Self::Data, Self::Image, Self::Control, Self::Bridge];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Image => "image",
            Self::Control => "control",
            Self::Bridge => "bridge",
        }
    }
}

impl fmt::Display for SubscriberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-unique subscriber handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Send half of a subscriber connection.
#[trait_variant::make(SubscriberSink: Send)]
pub trait LocalSubscriberSink {
    /// Peer description (used for logging)
    fn peer(&self) -> &str;

    /// Deliver one serialized message.
    ///
    /// # Errors
    /// Any error ends the subscriber's delivery loop.
    async fn send(&mut self, payload: String) -> Result<(), ContractError>;

    /// Close the connection (best effort)
    async fn close(&mut self) -> Result<(), ContractError>;
}

/// Receive half of a subscriber connection.
#[trait_variant::make(CommandSource: Send)]
pub trait LocalCommandSource {
    fn peer(&self) -> &str;

    /// Next text message; `None` once the peer has closed.
    async fn recv(&mut self) -> Option<Result<String, ContractError>>;
}
