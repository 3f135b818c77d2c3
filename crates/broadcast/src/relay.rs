//! CommandRelay - subscriber commands to the producer
//!
//! Runs as the receive half of a `control` or `bridge` connection,
//! independent of that connection's delivery task.

use std::sync::Arc;

use contracts::{fields, CommandSource, ContractError, ControlCommand, TelemetryValue};
use producer_link::ProducerHandle;
use serde_json::Value;
use snapshot_store::TelemetryMirror;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::error::{BroadcastError, Result};

/// Key of the bare joint-vector command form.
pub const LEGACY_JOINT_KEY: &str = "master_joint_values";

/// Counters returned when a receive loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub received: u64,
    pub forwarded: u64,
    /// Not JSON or not a command
    pub rejected: u64,
    /// Parsed, but the producer queue was full
    pub dropped: u64,
}

#[derive(Debug, Clone)]
pub struct CommandRelay {
    producer: ProducerHandle,
    telemetry: Arc<TelemetryMirror>,
}

impl CommandRelay {
    pub fn new(producer: ProducerHandle, telemetry: Arc<TelemetryMirror>) -> Self {
        Self {
            producer,
            telemetry,
        }
    }

    /// Parse one inbound text message.
    ///
    /// Accepts the full `ControlValue` shape (missing groups and fields take
    /// neutral defaults) or `{"master_joint_values": [...]}`.
    pub fn parse(text: &str) -> Result<ControlCommand> {
        let value: Value = serde_json::from_str(text).map_err(BroadcastError::NotJson)?;
        if !value.is_object() {
            return Err(BroadcastError::invalid_command("expected a JSON object"));
        }

        if let Some(joints) = value.get(LEGACY_JOINT_KEY) {
            let position: Vec<f64> = serde_json::from_value(joints.clone())
                .map_err(|e| BroadcastError::invalid_command(format!("{LEGACY_JOINT_KEY}: {e}")))?;
            return Ok(ControlCommand::from_joint_values(position));
        }

        serde_json::from_value(value).map_err(|e| BroadcastError::invalid_command(e.to_string()))
    }

    /// Copy the display subset of a command into the telemetry mirror.
    ///
    /// `gear_status` follows from `accel` inside the same write.
    pub fn mirror(&self, command: &ControlCommand) -> std::result::Result<(), ContractError> {
        let mirrored: [(&str, TelemetryValue); 4] = [
            (
                fields::MASTER_JOINT_ANGLES,
                command.robotarm.position.clone().into(),
            ),
            (fields::ACCEL, (command.mobile.linear_accel * 100.0).into()),
            (fields::BRAKE, (command.mobile.linear_brake * 100.0).into()),
            (fields::ANGLE, (command.mobile.steer * 90.0).into()),
        ];
        self.telemetry.set_fields(mirrored)
    }

    /// Parse, forward and mirror one message.
    pub fn handle(&self, text: &str) -> Result<ControlCommand> {
        let command = Self::parse(text)?;
        if let Err(e) = self.mirror(&command) {
            warn!(error = %e, "command mirror rejected");
        }
        if !self.producer.send_command(command.clone()) {
            return Err(BroadcastError::ProducerUnavailable {
                topic: "master_info",
            });
        }
        Ok(command)
    }

    /// Receive loop for one connection.
    ///
    /// Ends when the peer closes, the connection fails or `cancel` fires.
    /// Malformed messages are logged and skipped.
    #[instrument(name = "command_relay", skip_all, fields(peer = source.peer(), role = label))]
    pub async fn run<S: CommandSource>(
        &self,
        mut source: S,
        label: &'static str,
        cancel: CancellationToken,
    ) -> RelayStats {
        let mut stats = RelayStats::default();
        debug!("command relay started");

        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => break,
                message = source.recv() => message,
            };

            let text = match message {
                Some(Ok(text)) => text,
                Some(Err(e)) => {
                    if e.is_disconnect() {
                        debug!(error = %e, "command source closed");
                    } else {
                        warn!(error = %e, "command receive failed");
                    }
                    break;
                }
                None => break,
            };

            stats.received += 1;
            match self.handle(&text) {
                Ok(command) => {
                    stats.forwarded += 1;
                    observability::record_command_relayed(label, true);
                    trace!(stamp = command.stamp, "command forwarded");
                }
                Err(e @ BroadcastError::ProducerUnavailable { .. }) => {
                    stats.dropped += 1;
                    observability::record_command_relayed(label, false);
                    debug!(error = %e, "command dropped");
                }
                Err(e) => {
                    stats.rejected += 1;
                    observability::record_command_relayed(label, false);
                    warn!(error = %e, "command skipped");
                }
            }
        }

        info!(
            received = stats.received,
            forwarded = stats.forwarded,
            rejected = stats.rejected,
            "command relay stopped"
        );
        stats
    }
}
