//! Producer client abstraction
//!
//! The worker owns exactly one client; nothing else talks to the producer.

use std::future::Future;

use contracts::{ProducerEvent, ProducerMessage};

use crate::error::Result;

/// Transport to the producer side.
///
/// `recv_event` must be cancel-safe: the worker polls it inside `select!`.
pub trait ProducerClient: Send {
    /// Transport name (for logging)
    fn name(&self) -> &str;

    /// Next decoded event. `Err(Closed)` ends the worker.
    fn recv_event(&mut self) -> impl Future<Output = Result<ProducerEvent>> + Send;

    /// Publish one outbound message.
    fn send(&mut self, message: &ProducerMessage) -> impl Future<Output = Result<()>> + Send;
}
