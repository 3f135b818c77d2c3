//! # Contracts
//!
//! Frozen interface contracts (ICD), defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Producer capture stamps and bridge receive stamps are UNIX-epoch nanoseconds (`i64`)
//! - Outbound send stamps are UNIX-epoch milliseconds

mod blueprint;
mod channel;
mod channel_id;
mod command;
mod error;
mod frame;
mod producer;
mod registry;
mod settings;
mod subscriber;
mod telemetry;

pub use blueprint::*;
pub use channel::*;
pub use channel_id::ChannelId;
pub use command::*;
pub use error::*;
pub use frame::*;
pub use producer::*;
pub use registry::ChannelRegistry;
pub use settings::*;
pub use subscriber::*;
pub use telemetry::*;
