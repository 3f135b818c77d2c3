//! BroadcastHub - per-role snapshot fan-out
//!
//! One ticker per role copies the relevant store at the role's cadence and
//! publishes the copy into a `watch` slot. Every subscriber has its own
//! writer task that only ever sees the newest published snapshot, so a slow
//! connection skips intermediate snapshots instead of queueing them, and
//! never holds up the ticker or any other subscriber.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use contracts::{
    BridgeState, CadenceConfig, FrameStoreSnapshot, ImageMessage, SensorSnapshot, SubscriberId,
    SubscriberRole, SubscriberSink,
};
use snapshot_store::{BridgeStateCell, FrameStore, TelemetryMirror};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::error::{BroadcastError, Result};
use crate::metrics::{SubscriberMetrics, SubscriberMetricsSnapshot};

/// Stores the hub copies from.
#[derive(Debug, Clone)]
pub struct HubSources {
    pub frames: Arc<FrameStore>,
    pub telemetry: Arc<TelemetryMirror>,
    pub bridge_state: Arc<BridgeStateCell>,
}

/// Content of one role's snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum RoleSnapshot {
    Data(SensorSnapshot),
    Image(FrameStoreSnapshot),
    /// `control` and `bridge` roles
    State(BridgeState),
}

impl RoleSnapshot {
    /// Wire form. Image messages carry the send time.
    pub fn to_message(&self, server_send_timestamp_ms: i64) -> serde_json::Result<String> {
        match self {
            Self::Data(snapshot) => serde_json::to_string(snapshot),
            Self::Image(snapshot) => serde_json::to_string(&ImageMessage {
                images: &snapshot.images,
                server_send_timestamp_ms,
            }),
            Self::State(state) => serde_json::to_string(state),
        }
    }
}

/// A snapshot with its per-role sequence number (starting at 1).
#[derive(Debug)]
pub struct Published {
    pub version: u64,
    pub snapshot: RoleSnapshot,
}

type Slot = Option<Arc<Published>>;

/// How a subscriber's writer task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Unsubscribed or hub shut down
    Cancelled,
    /// Send failed; the subscriber was removed
    Disconnected,
}

struct SubscriberEntry {
    role: SubscriberRole,
    cancel: CancellationToken,
    metrics: Arc<SubscriberMetrics>,
}

/// Handle returned by [`BroadcastHub::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    role: SubscriberRole,
    cancel: CancellationToken,
    metrics: Arc<SubscriberMetrics>,
    task: JoinHandle<DeliveryOutcome>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn role(&self) -> SubscriberRole {
        self.role
    }

    pub fn metrics(&self) -> &Arc<SubscriberMetrics> {
        &self.metrics
    }

    /// Cancelled once the writer task stops, for whatever reason.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the writer task to stop.
    pub async fn finished(self) -> DeliveryOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(subscriber = %self.id, error = ?e, "delivery task panicked");
                DeliveryOutcome::Disconnected
            }
        }
    }
}

pub struct BroadcastHub {
    sources: HubSources,
    cadence: CadenceConfig,
    slots: [watch::Sender<Slot>; 4],
    subscribers: Mutex<HashMap<SubscriberId, SubscriberEntry>>,
    next_id: AtomicU64,
    cancel: CancellationToken,
}

fn slot_index(role: SubscriberRole) -> usize {
    match role {
        SubscriberRole::Data => 0,
        SubscriberRole::Image => 1,
        SubscriberRole::Control => 2,
        SubscriberRole::Bridge => 3,
    }
}

impl BroadcastHub {
    /// Create the hub. Cancelling `cancel` stops tickers and every subscriber.
    pub fn new(sources: HubSources, cadence: CadenceConfig, cancel: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            sources,
            cadence,
            slots: std::array::from_fn(|_| watch::channel(None).0),
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            cancel,
        })
    }

    pub fn sources(&self) -> &HubSources {
        &self.sources
    }

    /// Copy the role's store as it is now.
    pub fn take_snapshot(&self, role: SubscriberRole) -> RoleSnapshot {
        match role {
            SubscriberRole::Data => RoleSnapshot::Data(self.sources.telemetry.snapshot()),
            SubscriberRole::Image => RoleSnapshot::Image(self.sources.frames.snapshot()),
            SubscriberRole::Control | SubscriberRole::Bridge => {
                RoleSnapshot::State(self.sources.bridge_state.snapshot())
            }
        }
    }

    /// Take and publish a snapshot for `role`.
    ///
    /// Returns the new version, or `None` when an image snapshot was
    /// suppressed because no channel has a payload yet.
    pub fn publish(&self, role: SubscriberRole) -> Option<u64> {
        let snapshot = self.take_snapshot(role);
        if let RoleSnapshot::Image(frames) = &snapshot {
            if frames.is_all_placeholder() {
                trace!("no image payloads yet, tick skipped");
                return None;
            }
        }

        let mut version = 0;
        self.slots[slot_index(role)].send_modify(|slot| {
            version = slot.as_ref().map_or(0, |p| p.version) + 1;
            *slot = Some(Arc::new(Published { version, snapshot }));
        });
        Some(version)
    }

    /// Start one ticker per role.
    pub fn spawn_tickers(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        SubscriberRole::ALL
            .into_iter()
            .map(|role| tokio::spawn(Arc::clone(self).run_ticker(role)))
            .collect()
    }

    #[instrument(name = "broadcast_ticker", skip_all, fields(role = %role))]
    async fn run_ticker(self: Arc<Self>, role: SubscriberRole) {
        let period = self.cadence.period(role);
        debug!(period_ms = period.as_secs_f64() * 1000.0, "ticker started");

        let mut tick = tokio::time::interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tick.tick() => {}
            }
            // nobody listening, skip the copy
            if self.slots[slot_index(role)].receiver_count() == 0 {
                continue;
            }
            self.publish(role);
        }
        debug!("ticker stopped");
    }

    /// Register a connection and start its writer task.
    ///
    /// The first delivery is the next snapshot published after this call.
    pub fn subscribe<S>(self: &Arc<Self>, role: SubscriberRole, sink: S) -> Result<Subscription>
    where
        S: SubscriberSink + 'static,
    {
        if self.cancel.is_cancelled() {
            return Err(BroadcastError::Shutdown);
        }

        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let cancel = self.cancel.child_token();
        let metrics = Arc::new(SubscriberMetrics::new());
        let rx = self.slots[slot_index(role)].subscribe();
        let start_version = rx.borrow().as_ref().map_or(0, |p| p.version);

        let count = {
            let mut subscribers = self.lock();
            subscribers.insert(
                id,
                SubscriberEntry {
                    role,
                    cancel: cancel.clone(),
                    metrics: Arc::clone(&metrics),
                },
            );
            count_role(&subscribers, role)
        };
        observability::set_subscribers(role.as_str(), count);
        info!(subscriber = %id, role = %role, peer = sink.peer(), count, "subscriber added");

        let task = tokio::spawn(Arc::clone(self).deliver(
            id,
            role,
            sink,
            rx,
            start_version,
            cancel.clone(),
            Arc::clone(&metrics),
        ));

        Ok(Subscription {
            id,
            role,
            cancel,
            metrics,
            task,
        })
    }

    /// Stop a subscriber's writer task. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        match self.remove(id) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn subscriber_count(&self, role: SubscriberRole) -> usize {
        count_role(&self.lock(), role)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn subscriber_metrics(&self, id: SubscriberId) -> Option<SubscriberMetricsSnapshot> {
        self.lock().get(&id).map(|entry| entry.metrics.snapshot())
    }

    /// Stop tickers and all subscribers.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    #[instrument(
        name = "subscriber_delivery",
        skip_all,
        fields(subscriber = %id, role = %role, peer = sink.peer())
    )]
    async fn deliver<S: SubscriberSink>(
        self: Arc<Self>,
        id: SubscriberId,
        role: SubscriberRole,
        mut sink: S,
        mut rx: watch::Receiver<Slot>,
        mut last_version: u64,
        cancel: CancellationToken,
        metrics: Arc<SubscriberMetrics>,
    ) -> DeliveryOutcome {
        let outcome = loop {
            tokio::select! {
                _ = cancel.cancelled() => break DeliveryOutcome::Cancelled,
                changed = rx.changed() => {
                    if changed.is_err() {
                        break DeliveryOutcome::Cancelled;
                    }
                }
            }

            let Some(published) = rx.borrow_and_update().clone() else {
                continue;
            };

            let skipped = published.version.saturating_sub(last_version + 1);
            if skipped > 0 {
                metrics.add_skipped(skipped);
                observability::record_snapshots_skipped(role.as_str(), skipped);
                trace!(skipped, "subscriber behind, older snapshots dropped");
            }
            last_version = published.version;

            let payload = match published
                .snapshot
                .to_message(Utc::now().timestamp_millis())
            {
                Ok(payload) => payload,
                Err(source) => {
                    let e = BroadcastError::Serialize {
                        role: role.as_str(),
                        source,
                    };
                    warn!(error = %e, "snapshot dropped");
                    continue;
                }
            };

            match sink.send(payload).await {
                Ok(()) => {
                    metrics.inc_delivered();
                    observability::record_delivery(role.as_str());
                }
                Err(e) => {
                    metrics.inc_failures();
                    observability::record_delivery_failure(role.as_str());
                    if e.is_disconnect() {
                        info!(error = %e, "subscriber disconnected");
                    } else {
                        warn!(error = %e, "delivery failed, dropping subscriber");
                    }
                    break DeliveryOutcome::Disconnected;
                }
            }
        };

        // lets the paired receive loop stop too
        cancel.cancel();
        if let Err(e) = sink.close().await {
            debug!(error = %e, "close failed");
        }
        self.remove(id);

        let stats = metrics.snapshot();
        info!(
            delivered = stats.delivered,
            skipped = stats.skipped,
            outcome = ?outcome,
            "subscriber removed"
        );
        outcome
    }

    fn remove(&self, id: SubscriberId) -> Option<SubscriberEntry> {
        let (entry, count) = {
            let mut subscribers = self.lock();
            let entry = subscribers.remove(&id)?;
            let count = count_role(&subscribers, entry.role);
            (entry, count)
        };
        observability::set_subscribers(entry.role.as_str(), count);
        Some(entry)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriberId, SubscriberEntry>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn count_role(subscribers: &HashMap<SubscriberId, SubscriberEntry>, role: SubscriberRole) -> usize {
    subscribers.values().filter(|e| e.role == role).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::memory_sink;
    use contracts::{
        fields, ChannelDescriptor, ChannelRegistry, ContractError, TelemetrySchema,
    };
    use std::time::Duration;
    use tokio::time::sleep;

    fn sources() -> HubSources {
        let registry = ChannelRegistry::new(vec![
            ChannelDescriptor::color("mobile_rgb", 4, 4),
            ChannelDescriptor::color("hand_rgb", 4, 4),
        ])
        .unwrap();
        HubSources {
            frames: Arc::new(FrameStore::new(&registry)),
            telemetry: Arc::new(TelemetryMirror::new(&TelemetrySchema::default())),
            bridge_state: Arc::new(BridgeStateCell::default()),
        }
    }

    fn hub() -> Arc<BroadcastHub> {
        BroadcastHub::new(sources(), CadenceConfig::default(), CancellationToken::new())
    }

    /// Records the battery value of every data message; the first send
    /// takes `first_send_delay`.
    struct SlowSink {
        received: Arc<Mutex<Vec<f64>>>,
        first_send_delay: Duration,
        sends: usize,
    }

    impl SubscriberSink for SlowSink {
        fn peer(&self) -> &str {
            "slow"
        }

        async fn send(&mut self, payload: String) -> std::result::Result<(), ContractError> {
            let value: serde_json::Value = serde_json::from_str(&payload)?;
            let battery = value[fields::BATTERY].as_f64().unwrap_or(-1.0);
            self.received.lock().unwrap().push(battery);
            self.sends += 1;
            if self.sends == 1 {
                sleep(self.first_send_delay).await;
            }
            Ok(())
        }

        async fn close(&mut self) -> std::result::Result<(), ContractError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_subscriber_gets_latest_not_backlog() {
        let hub = hub();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sub = hub
            .subscribe(
                SubscriberRole::Data,
                SlowSink {
                    received: Arc::clone(&received),
                    first_send_delay: Duration::from_millis(30),
                    sends: 0,
                },
            )
            .unwrap();

        // the first send stalls for three 10 ms ticks
        for (battery, wait_ms) in [(1.0, 10), (2.0, 10), (3.0, 5), (4.0, 20)] {
            hub.sources().telemetry.set_field(fields::BATTERY, battery).unwrap();
            hub.publish(SubscriberRole::Data);
            sleep(Duration::from_millis(wait_ms)).await;
        }

        assert_eq!(*received.lock().unwrap(), vec![1.0, 4.0]);
        let stats = sub.metrics().snapshot();
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.skipped, 2);

        hub.shutdown();
        assert_eq!(sub.finished().await, DeliveryOutcome::Cancelled);
    }

    #[tokio::test]
    async fn image_ticks_suppressed_until_first_payload() {
        let hub = hub();
        assert_eq!(hub.publish(SubscriberRole::Image), None);

        hub.sources()
            .frames
            .update("mobile_rgb", "data:image/jpeg;base64,AAAA")
            .unwrap();
        assert_eq!(hub.publish(SubscriberRole::Image), Some(1));
        assert_eq!(hub.publish(SubscriberRole::Image), Some(2));
        // other roles count separately
        assert_eq!(hub.publish(SubscriberRole::Data), Some(1));
    }

    #[tokio::test]
    async fn image_message_carries_every_channel_and_send_time() {
        let hub = hub();
        hub.sources().frames.update("hand_rgb", "data:x").unwrap();
        let (sink, mut rx) = memory_sink("viewer");
        let _sub = hub.subscribe(SubscriberRole::Image, sink).unwrap();

        hub.publish(SubscriberRole::Image);
        let message: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(message["images"]["hand_rgb"], "data:x");
        assert_eq!(message["images"]["mobile_rgb"], "");
        assert!(message["server_send_timestamp_ms"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn failed_subscriber_does_not_affect_others() {
        let hub = hub();
        hub.sources().frames.update("mobile_rgb", "data:1").unwrap();

        let (first_sink, first_rx) = memory_sink("first");
        let (second_sink, mut second_rx) = memory_sink("second");
        let first = hub.subscribe(SubscriberRole::Image, first_sink).unwrap();
        let _second = hub.subscribe(SubscriberRole::Image, second_sink).unwrap();
        assert_eq!(hub.subscriber_count(SubscriberRole::Image), 2);

        // first client goes away mid-stream
        drop(first_rx);
        hub.publish(SubscriberRole::Image);
        assert!(second_rx.recv().await.is_some());
        assert_eq!(first.finished().await, DeliveryOutcome::Disconnected);
        assert_eq!(hub.subscriber_count(SubscriberRole::Image), 1);

        hub.sources().frames.update("mobile_rgb", "data:2").unwrap();
        hub.publish(SubscriberRole::Image);
        let message: serde_json::Value =
            serde_json::from_str(&second_rx.recv().await.unwrap()).unwrap();
        assert_eq!(message["images"]["mobile_rgb"], "data:2");
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery_and_closes_sink() {
        let hub = hub();
        let (sink, mut rx) = memory_sink("viewer");
        let sub = hub.subscribe(SubscriberRole::Control, sink).unwrap();
        let token = sub.cancel_token();

        assert!(hub.unsubscribe(sub.id()));
        assert!(!hub.unsubscribe(sub.id()));
        assert_eq!(sub.finished().await, DeliveryOutcome::Cancelled);
        assert!(token.is_cancelled());
        assert!(rx.recv().await.is_none());
        assert!(hub.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn tickers_deliver_at_cadence_until_shutdown() {
        let cancel = CancellationToken::new();
        let hub = BroadcastHub::new(sources(), CadenceConfig::default(), cancel.clone());
        let tickers = hub.spawn_tickers();

        let (sink, mut rx) = memory_sink("bridge-client");
        let sub = hub.subscribe(SubscriberRole::Bridge, sink).unwrap();

        sleep(Duration::from_millis(105)).await;
        let mut messages = 0;
        while let Ok(message) = rx.try_recv() {
            let state: BridgeState = serde_json::from_str(&message).unwrap();
            assert!(state.mobile.gear);
            messages += 1;
        }
        // 100 Hz over ~100 ms
        assert!((8..=11).contains(&messages), "got {messages}");

        cancel.cancel();
        for ticker in tickers {
            ticker.await.unwrap();
        }
        assert_eq!(sub.finished().await, DeliveryOutcome::Cancelled);
        assert!(matches!(
            hub.subscribe(SubscriberRole::Data, memory_sink("late").0),
            Err(BroadcastError::Shutdown)
        ));
    }
}
