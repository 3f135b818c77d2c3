//! In-process producer link
//!
//! [`MockProducerRemote`] plays the producer: it emits events and keeps the
//! most recent messages the bridge published, plus the newest command that
//! has not been picked up yet.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use contracts::{ControlCommand, ProducerEvent, ProducerMessage};
use ringbuf::{traits::*, HeapRb};
use tokio::sync::mpsc;

use crate::client::ProducerClient;
use crate::error::{ProducerLinkError, Result};

/// Messages kept for inspection; older ones are overwritten.
pub const SENT_LOG_CAPACITY: usize = 256;

struct SentLog {
    recent: HeapRb<ProducerMessage>,
    total: usize,
    pending_command: Option<ControlCommand>,
}

impl Default for SentLog {
    fn default() -> Self {
        Self {
            recent: HeapRb::new(SENT_LOG_CAPACITY),
            total: 0,
            pending_command: None,
        }
    }
}

type SharedLog = Arc<Mutex<SentLog>>;

fn lock(log: &SharedLog) -> MutexGuard<'_, SentLog> {
    log.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bridge side of a mock link.
pub struct MockProducerClient {
    events: mpsc::UnboundedReceiver<ProducerEvent>,
    sent: SharedLog,
}

/// Producer side of a mock link. The link closes when every remote is dropped.
#[derive(Clone)]
pub struct MockProducerRemote {
    events: mpsc::UnboundedSender<ProducerEvent>,
    sent: SharedLog,
}

/// Create a connected client/remote pair.
pub fn mock_link() -> (MockProducerClient, MockProducerRemote) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sent = SharedLog::default();
    (
        MockProducerClient {
            events: rx,
            sent: Arc::clone(&sent),
        },
        MockProducerRemote { events: tx, sent },
    )
}

impl MockProducerRemote {
    /// Returns `false` once the client is gone.
    pub fn emit(&self, event: ProducerEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Most recent messages, oldest first, at most [`SENT_LOG_CAPACITY`].
    pub fn sent(&self) -> Vec<ProducerMessage> {
        lock(&self.sent).recent.iter().cloned().collect()
    }

    /// Every message ever published, including overwritten ones.
    pub fn sent_count(&self) -> usize {
        lock(&self.sent).total
    }

    /// Newest `master_info` command since the last call.
    pub fn take_latest_command(&self) -> Option<ControlCommand> {
        lock(&self.sent).pending_command.take()
    }
}

impl ProducerClient for MockProducerClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn recv_event(&mut self) -> Result<ProducerEvent> {
        self.events.recv().await.ok_or(ProducerLinkError::Closed)
    }

    async fn send(&mut self, message: &ProducerMessage) -> Result<()> {
        let mut log = lock(&self.sent);
        if let ProducerMessage::MasterInfo(command) = message {
            log.pending_command = Some(command.clone());
        }
        log.total += 1;
        log.recent.push_overwrite(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ControlValue;

    fn command(accel: f64) -> ProducerMessage {
        let mut value = ControlValue::default();
        value.mobile.linear_accel = accel;
        ProducerMessage::MasterInfo(value)
    }

    #[tokio::test]
    async fn sent_log_stays_bounded() {
        let (mut client, remote) = mock_link();
        for round in 1..=3 {
            for i in 0..10_000 {
                client.send(&command(i as f64)).await.unwrap();
            }
            assert_eq!(remote.sent_count(), round * 10_000);
            assert_eq!(remote.sent().len(), SENT_LOG_CAPACITY);
            assert!(remote.take_latest_command().is_some());
        }

        let sent = remote.sent();
        assert!(matches!(
            sent.last(),
            Some(ProducerMessage::MasterInfo(c)) if c.mobile.linear_accel == 9_999.0
        ));
    }

    #[tokio::test]
    async fn latest_command_is_taken_once() {
        let (mut client, remote) = mock_link();
        assert!(remote.take_latest_command().is_none());

        client.send(&command(1.0)).await.unwrap();
        client
            .send(&ProducerMessage::RecordingState {
                data: "start_recording".into(),
            })
            .await
            .unwrap();
        client.send(&command(-1.0)).await.unwrap();

        let latest = remote.take_latest_command().unwrap();
        assert_eq!(latest.mobile.linear_accel, -1.0);
        assert!(remote.take_latest_command().is_none());
        assert_eq!(remote.sent_count(), 3);
    }
}
