//! In-memory connection halves
//!
//! Channel-backed [`SubscriberSink`] / [`CommandSource`] implementations for
//! tests and for wiring the hub without a network transport.

use contracts::{CommandSource, ContractError, SubscriberSink};
use tokio::sync::mpsc;

/// Sink that forwards every message into an unbounded channel.
#[derive(Debug)]
pub struct MemorySink {
    peer: String,
    tx: Option<mpsc::UnboundedSender<String>>,
}

/// Create a sink and the receiver that observes what it was sent.
///
/// Dropping the receiver makes the next `send` fail as a disconnect.
pub fn memory_sink(peer: impl Into<String>) -> (MemorySink, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        MemorySink {
            peer: peer.into(),
            tx: Some(tx),
        },
        rx,
    )
}

impl SubscriberSink for MemorySink {
    fn peer(&self) -> &str {
        &self.peer
    }

    async fn send(&mut self, payload: String) -> Result<(), ContractError> {
        match &self.tx {
            Some(tx) => tx
                .send(payload)
                .map_err(|_| ContractError::connection_closed(&self.peer)),
            None => Err(ContractError::connection_closed(&self.peer)),
        }
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.tx = None;
        Ok(())
    }
}

/// Source fed by the sender returned from [`memory_source`].
#[derive(Debug)]
pub struct MemorySource {
    peer: String,
    rx: mpsc::UnboundedReceiver<String>,
}

/// Create a source; dropping the sender closes it.
pub fn memory_source(peer: impl Into<String>) -> (mpsc::UnboundedSender<String>, MemorySource) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        tx,
        MemorySource {
            peer: peer.into(),
            rx,
        },
    )
}

impl CommandSource for MemorySource {
    fn peer(&self) -> &str {
        &self.peer
    }

    async fn recv(&mut self) -> Option<Result<String, ContractError>> {
        self.rx.recv().await.map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sink_fails_once_receiver_dropped() {
        let (mut sink, mut rx) = memory_sink("test");
        sink.send("a".into()).await.unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("a"));

        drop(rx);
        let err = sink.send("b".into()).await.unwrap_err();
        assert!(err.is_disconnect());
    }

    #[tokio::test]
    async fn source_ends_when_sender_dropped() {
        let (tx, mut source) = memory_source("test");
        tx.send("hello".into()).unwrap();
        drop(tx);

        assert_eq!(source.recv().await.unwrap().unwrap(), "hello");
        assert!(source.recv().await.is_none());
    }
}
