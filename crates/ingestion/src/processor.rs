//! FrameProcessor - `WaitingForSignal -> Processing -> Publishing` loop
//!
//! Runs on its own named thread. Each cycle copies every configured
//! channel out of the attacher, encodes it and publishes the whole cycle to
//! the [`FrameStore`] in one write. Channels fail independently.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use attacher::SharedBufferAttacher;
use chrono::Utc;
use contracts::{CapturedFrame, ChannelDescriptor, ChannelId, ProcessingConfig};
use observability::BridgeMetricsAggregator;
use snapshot_store::{FrameStore, LatencyHistory};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::encoder::FrameEncoder;
use crate::error::{IngestionError, Result};
use crate::signal::{SignalWaiter, WaitOutcome};
use crate::stats::{ProcessorMetrics, ProcessorMetricsSnapshot};

/// Source of "now" in UNIX-epoch nanoseconds.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Wall clock.
pub fn system_clock_ns() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}

/// What one processing cycle did.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Published channels and their latency (ms)
    pub published: Vec<(ChannelId, f64)>,
    /// Channels reset to the placeholder this cycle
    pub failed: Vec<(ChannelId, IngestionError)>,
}

impl CycleReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn latency_ms(&self, channel_id: &str) -> Option<f64> {
        self.published
            .iter()
            .find(|(id, _)| id == channel_id)
            .map(|(_, ms)| *ms)
    }
}

pub struct FrameProcessor {
    attacher: Arc<SharedBufferAttacher>,
    store: Arc<FrameStore>,
    waiter: Arc<SignalWaiter>,
    encoder: FrameEncoder,
    history: LatencyHistory,
    metrics: Arc<ProcessorMetrics>,
    aggregator: Option<Arc<Mutex<BridgeMetricsAggregator>>>,
    clock: Clock,
    signal_timeout: Duration,
    latency_log_interval: Duration,
    last_latency_log: Instant,
}

impl FrameProcessor {
    pub fn new(
        config: &ProcessingConfig,
        attacher: Arc<SharedBufferAttacher>,
        store: Arc<FrameStore>,
        waiter: Arc<SignalWaiter>,
    ) -> Self {
        Self {
            attacher,
            store,
            waiter,
            encoder: FrameEncoder::from_config(config),
            history: LatencyHistory::new(config.latency_history),
            metrics: Arc::new(ProcessorMetrics::new()),
            aggregator: None,
            clock: Arc::new(system_clock_ns),
            signal_timeout: config.signal_timeout(),
            latency_log_interval: config.latency_log_interval(),
            last_latency_log: Instant::now(),
        }
    }

    /// Replace the receive-time clock.
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Also feed an in-process aggregator (printed at shutdown).
    pub fn with_aggregator(mut self, aggregator: Arc<Mutex<BridgeMetricsAggregator>>) -> Self {
        self.aggregator = Some(aggregator);
        self
    }

    pub fn metrics(&self) -> Arc<ProcessorMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn history(&self) -> &LatencyHistory {
        &self.history
    }

    /// Run one cycle for a ready signal captured at `capture_timestamp_ns`.
    pub fn process_cycle(&mut self, capture_timestamp_ns: i64) -> CycleReport {
        // Processing: one receive stamp for the whole cycle
        let receive_timestamp_ns = (self.clock)();
        let mut frames = Vec::with_capacity(self.attacher.registry().len());
        let mut report = CycleReport::default();

        for descriptor in self.attacher.registry().iter() {
            match self.capture(descriptor, capture_timestamp_ns, receive_timestamp_ns) {
                Ok(frame) => {
                    let latency = frame.latency_ms();
                    if !frame.is_clock_consistent() {
                        warn!(
                            channel = %frame.channel_id,
                            latency_ms = latency,
                            "receive time precedes capture time, clocks out of sync"
                        );
                        self.metrics.record_clock_skew();
                        observability::record_clock_skew(&frame.channel_id);
                    }
                    report.published.push((frame.channel_id.clone(), latency));
                    frames.push(frame);
                }
                Err(e) => {
                    match &e {
                        IngestionError::Attachment(_) => {
                            debug!(channel = %descriptor.id, error = %e, "channel skipped")
                        }
                        _ => warn!(channel = %descriptor.id, error = %e, "channel failed"),
                    }
                    observability::record_encode_failure(&descriptor.id, e.reason());
                    report.failed.push((descriptor.id.clone(), e));
                }
            }
        }

        // Publishing
        let failed: Vec<ChannelId> = report.failed.iter().map(|(id, _)| id.clone()).collect();
        self.store.apply_cycle(frames, &failed);

        for (channel_id, latency) in &report.published {
            self.history.record(channel_id, *latency);
            observability::record_frame_latency_ms(channel_id, *latency);
        }
        self.metrics.record_cycle(report.published.len(), report.failed.len());
        observability::record_processing_cycle(report.published.len(), report.failed.len());

        if let Some(aggregator) = &self.aggregator {
            aggregator
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .record_cycle(
                    report.published.iter().map(|(id, ms)| (id.as_str(), *ms)),
                    report.failed.len(),
                );
        }

        trace!(
            published = report.published.len(),
            failed = report.failed.len(),
            "cycle published"
        );
        report
    }

    /// Copy (under the attacher's lock) then encode (outside it).
    fn capture(
        &self,
        descriptor: &ChannelDescriptor,
        capture_timestamp_ns: i64,
        receive_timestamp_ns: i64,
    ) -> Result<CapturedFrame> {
        let raw = self.attacher.copy_out(&descriptor.id)?;
        let encoded_payload = self.encoder.encode(descriptor, &raw)?;
        Ok(CapturedFrame {
            channel_id: descriptor.id.clone(),
            encoded_payload,
            capture_timestamp_ns,
            receive_timestamp_ns,
        })
    }

    /// Blocking loop; returns when the waiter is shut down.
    #[instrument(
        name = "frame_processor",
        skip(self),
        fields(channels = self.attacher.registry().len())
    )]
    pub fn run(mut self) -> ProcessorMetricsSnapshot {
        info!(
            timeout_ms = self.signal_timeout.as_millis() as u64,
            ready_tag = self.waiter.ready_tag(),
            "frame processor started"
        );

        loop {
            match self.waiter.wait(self.signal_timeout) {
                WaitOutcome::Ready(capture_timestamp_ns) => {
                    self.process_cycle(capture_timestamp_ns);
                }
                WaitOutcome::Idle => {
                    self.metrics.record_idle();
                    trace!("no ready signal, waiting again");
                }
                WaitOutcome::Shutdown => break,
            }
            self.maybe_log_latency();
        }

        let snapshot = self.metrics.snapshot();
        info!(
            cycles = snapshot.cycles,
            complete = snapshot.complete_cycles,
            failures = snapshot.channel_failures,
            "frame processor stopped"
        );
        snapshot
    }

    /// Start [`run`](Self::run) on a dedicated thread.
    pub fn spawn(self) -> std::io::Result<FrameProcessorHandle> {
        let waiter = Arc::clone(&self.waiter);
        let metrics = Arc::clone(&self.metrics);
        let thread = std::thread::Builder::new()
            .name("frame-processor".into())
            .spawn(move || self.run())?;

        Ok(FrameProcessorHandle {
            thread,
            waiter,
            metrics,
        })
    }

    /// Age of every populated channel's payload, by the processor clock.
    pub fn frame_ages_ms(&self) -> Vec<(ChannelId, f64)> {
        self.store
            .ages_ms((self.clock)())
            .into_iter()
            .filter_map(|(id, age)| age.map(|ms| (id, ms)))
            .collect()
    }

    /// Channels whose payload is older than `max_age`.
    pub fn stale_channels(&self, max_age: Duration) -> Vec<(ChannelId, f64)> {
        let limit_ms = max_age.as_secs_f64() * 1000.0;
        self.frame_ages_ms()
            .into_iter()
            .filter(|(_, age_ms)| *age_ms > limit_ms)
            .collect()
    }

    fn maybe_log_latency(&mut self) {
        if self.last_latency_log.elapsed() < self.latency_log_interval {
            return;
        }
        self.last_latency_log = Instant::now();

        let limit_ms = self.latency_log_interval.as_secs_f64() * 1000.0;
        for (channel_id, age_ms) in self.frame_ages_ms() {
            observability::record_frame_age_ms(&channel_id, age_ms);
            if age_ms > limit_ms {
                warn!(channel = %channel_id, age_ms, "image frame is stale");
            }
        }

        let summaries = self.history.summaries();
        if summaries.is_empty() {
            debug!("no latency samples in this interval");
            return;
        }
        for (channel_id, summary) in summaries {
            info!(
                channel = %channel_id,
                mean_ms = summary.mean_ms,
                min_ms = summary.min_ms,
                max_ms = summary.max_ms,
                samples = summary.count,
                "average image latency"
            );
        }
    }
}

/// Owner handle for the processor thread.
#[derive(Debug)]
pub struct FrameProcessorHandle {
    thread: JoinHandle<ProcessorMetricsSnapshot>,
    waiter: Arc<SignalWaiter>,
    metrics: Arc<ProcessorMetrics>,
}

impl FrameProcessorHandle {
    pub fn metrics(&self) -> ProcessorMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Unblock the signal wait and join the thread.
    pub fn shutdown(self) -> ProcessorMetricsSnapshot {
        self.waiter.shutdown();
        match self.thread.join() {
            Ok(snapshot) => snapshot,
            Err(_) => {
                error!("frame processor thread panicked");
                self.metrics.snapshot()
            }
        }
    }
}
