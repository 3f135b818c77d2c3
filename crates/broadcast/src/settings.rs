//! SettingsChannel - dataset settings and recording control
//!
//! Request/reply over one connection: every inbound text gets exactly one
//! text reply. Bad messages are answered with an `ERROR:` reply and the
//! connection stays open.

use std::sync::{Mutex, MutexGuard, PoisonError};

use contracts::{
    CommandSource, DatasetSettings, ProducerMessage, RecordingCommand, SettingsMessage,
    SubscriberSink,
};
use producer_link::ProducerHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

pub const ACK_DATASET_SETTINGS: &str = "ACK: dataset settings updated";
pub const ERR_UNKNOWN_TYPE: &str = "ERROR: unknown payload type";
pub const ERR_NOT_JSON: &str = "ERROR: Only JSON payloads are supported.";

/// Counters returned when a settings connection ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsStats {
    pub received: u64,
    pub acknowledged: u64,
    pub errors: u64,
}

/// Shared by every settings connection; holds the current dataset settings.
#[derive(Debug)]
pub struct SettingsChannel {
    producer: ProducerHandle,
    settings: Mutex<DatasetSettings>,
}

impl SettingsChannel {
    pub fn new(producer: ProducerHandle) -> Self {
        Self::with_settings(producer, DatasetSettings::default())
    }

    pub fn with_settings(producer: ProducerHandle, settings: DatasetSettings) -> Self {
        Self {
            producer,
            settings: Mutex::new(settings),
        }
    }

    pub fn current(&self) -> DatasetSettings {
        self.lock().clone()
    }

    /// Handle one message and build its reply.
    pub fn handle(&self, text: &str) -> String {
        let payload: serde_json::Value = match serde_json::from_str(text) {
            Ok(payload) => payload,
            Err(_) => {
                observability::record_settings_message("not_json");
                return ERR_NOT_JSON.to_string();
            }
        };

        match SettingsMessage::from_json(payload) {
            Ok(SettingsMessage::DatasetSetting(update)) => {
                let merged = {
                    let mut settings = self.lock();
                    settings.merge(update);
                    settings.clone()
                };
                info!(settings = ?merged, "dataset settings updated");

                match serde_json::to_string(&merged) {
                    Ok(data) => {
                        self.producer
                            .try_send(ProducerMessage::DatasetSettings { data });
                    }
                    Err(e) => warn!(error = %e, "failed to serialize dataset settings"),
                }
                observability::record_settings_message("dataset_setting");
                ACK_DATASET_SETTINGS.to_string()
            }
            Ok(SettingsMessage::Recording(command)) => {
                info!(command = command.as_str(), "recording command received");
                self.forward_recording(command);
                observability::record_settings_message("recording");
                format!("ACK: {}", command.as_str())
            }
            Ok(SettingsMessage::Unknown(msg_type)) => {
                debug!(msg_type = ?msg_type, "unknown settings payload type");
                observability::record_settings_message("unknown_type");
                ERR_UNKNOWN_TYPE.to_string()
            }
            Err(e) => {
                observability::record_settings_message("invalid");
                format!("ERROR: {e}")
            }
        }
    }

    fn forward_recording(&self, command: RecordingCommand) {
        self.producer.try_send(ProducerMessage::RecordingState {
            data: command.as_str().to_string(),
        });
    }

    /// Serve one connection until the peer closes or `cancel` fires.
    #[instrument(name = "settings_channel", skip_all, fields(peer = source.peer()))]
    pub async fn run<R, S>(&self, mut source: R, mut sink: S, cancel: CancellationToken) -> SettingsStats
    where
        R: CommandSource,
        S: SubscriberSink,
    {
        let mut stats = SettingsStats::default();

        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => break,
                message = source.recv() => message,
            };
            let text = match message {
                Some(Ok(text)) => text,
                Some(Err(e)) => {
                    debug!(error = %e, "settings connection ended");
                    break;
                }
                None => break,
            };

            stats.received += 1;
            let reply = self.handle(&text);
            if reply.starts_with("ACK") {
                stats.acknowledged += 1;
            } else {
                stats.errors += 1;
            }

            if let Err(e) = sink.send(reply).await {
                debug!(error = %e, "settings reply failed");
                break;
            }
        }

        if let Err(e) = sink.close().await {
            debug!(error = %e, "close failed");
        }
        stats
    }

    fn lock(&self) -> MutexGuard<'_, DatasetSettings> {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
