//! ProducerWorker - the single task that owns the producer client
//!
//! Inbound events are applied to the signal waiter and the stores; outbound
//! messages arrive through a bounded queue fed by [`ProducerHandle`].

use std::sync::Arc;

use contracts::{
    fields, ControlCommand, ContractError, ProducerEvent, ProducerMessage, TelemetryValue,
};
use ingestion::SignalWaiter;
use snapshot_store::{BridgeStateCell, TelemetryMirror};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::client::ProducerClient;
use crate::error::ProducerLinkError;

/// Robot status shown once the robot reports its own state.
pub const AUTO_STATUS: &str = "AUTO";

/// Where producer events land.
#[derive(Clone)]
pub struct EventTargets {
    pub waiter: Arc<SignalWaiter>,
    pub telemetry: Arc<TelemetryMirror>,
    pub bridge_state: Arc<BridgeStateCell>,
}

impl EventTargets {
    /// Apply one event.
    pub fn apply(&self, event: ProducerEvent) -> Result<(), ContractError> {
        observability::record_producer_event(event.topic());

        match event {
            ProducerEvent::ImageSignal(signal) => {
                if signal.capture_timestamp_ns().is_none() {
                    return Err(ContractError::stamp_out_of_range(signal.stamp));
                }
                self.waiter.notify(&signal);
                Ok(())
            }
            ProducerEvent::RobotToGui(gui) => {
                let updates: [(&str, TelemetryValue); 7] = [
                    (fields::BATTERY, gui.battery.into()),
                    (fields::LINEAR_SPEED, gui.linear_accel.into()),
                    (fields::ANGULAR_SPEED, gui.steer.into()),
                    (fields::GRIPPER_OPENING, gui.gripper_opening.into()),
                    (fields::JOINT_ANGLES, gui.joint_angles.into()),
                    (fields::CARTESIAN_POSITION, gui.cartesian_position.into()),
                    (fields::FORCE_SENSOR, gui.force_torque.into()),
                ];
                self.telemetry.set_fields(updates)
            }
            ProducerEvent::SlaveInfo(state) => {
                let mirrored: [(&str, TelemetryValue); 6] = [
                    (fields::ROBOT_STATUS, AUTO_STATUS.into()),
                    (fields::LINEAR_SPEED, state.mobile.linear_accel.into()),
                    (fields::ANGULAR_SPEED, state.mobile.steer.into()),
                    (fields::GRIPPER_OPENING, state.gripper_opening().into()),
                    (fields::JOINT_ANGLES, state.robotarm.position.clone().into()),
                    (fields::FORCE_SENSOR, state.robotarm.force.clone().into()),
                ];
                self.bridge_state.replace(state);
                self.telemetry.set_fields(mirrored)
            }
            ProducerEvent::CartesianPosition { data } => {
                self.telemetry.set_field(fields::CARTESIAN_POSITION, data)
            }
        }
    }
}

/// Outbound side, cloned into every relay/settings connection.
#[derive(Debug, Clone)]
pub struct ProducerHandle {
    tx: mpsc::Sender<ProducerMessage>,
}

impl ProducerHandle {
    /// Bounded queue between callers and the worker.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProducerMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue a message without waiting. Returns `false` if it was dropped.
    pub fn try_send(&self, message: ProducerMessage) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(message)) => {
                warn!(topic = message.topic(), "producer queue full, message dropped");
                observability::record_producer_message(message.topic(), false);
                false
            }
            Err(TrySendError::Closed(message)) => {
                debug!(topic = message.topic(), "producer worker gone, message dropped");
                observability::record_producer_message(message.topic(), false);
                false
            }
        }
    }

    pub fn send_command(&self, command: ControlCommand) -> bool {
        self.try_send(ProducerMessage::MasterInfo(command))
    }
}

/// Counters returned when the worker stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub events: u64,
    pub rejected_events: u64,
    pub messages_sent: u64,
    pub send_failures: u64,
}

pub struct ProducerWorker<C> {
    client: C,
    targets: EventTargets,
    outbound: mpsc::Receiver<ProducerMessage>,
    stats: WorkerStats,
}

impl<C: ProducerClient> ProducerWorker<C> {
    pub fn new(client: C, targets: EventTargets, outbound: mpsc::Receiver<ProducerMessage>) -> Self {
        Self {
            client,
            targets,
            outbound,
            stats: WorkerStats::default(),
        }
    }

    /// Run until cancelled or the link closes.
    #[instrument(name = "producer_worker", skip_all, fields(client = self.client.name()))]
    pub async fn run(mut self, cancel: CancellationToken) -> WorkerStats {
        info!("producer worker started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("producer worker cancelled");
                    break;
                }
                Some(message) = self.outbound.recv() => {
                    self.publish(message).await;
                }
                event = self.client.recv_event() => match event {
                    Ok(event) => self.handle_event(event),
                    Err(ProducerLinkError::Closed) => {
                        info!("producer link closed");
                        break;
                    }
                    Err(e) => warn!(error = %e, "producer receive failed"),
                },
            }
        }

        info!(
            events = self.stats.events,
            sent = self.stats.messages_sent,
            send_failures = self.stats.send_failures,
            "producer worker stopped"
        );
        self.stats
    }

    fn handle_event(&mut self, event: ProducerEvent) {
        self.stats.events += 1;
        let topic = event.topic();
        trace!(topic, "producer event");
        if let Err(e) = self.targets.apply(event) {
            self.stats.rejected_events += 1;
            warn!(topic, error = %e, "producer event rejected");
        }
    }

    async fn publish(&mut self, message: ProducerMessage) {
        let topic = message.topic();
        match self.client.send(&message).await {
            Ok(()) => {
                self.stats.messages_sent += 1;
                observability::record_producer_message(topic, true);
            }
            Err(e) => {
                self.stats.send_failures += 1;
                observability::record_producer_message(topic, false);
                warn!(topic, error = %e, "failed to publish to producer");
            }
        }
    }
}
