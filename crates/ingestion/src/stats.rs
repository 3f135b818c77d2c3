//! Frame processor counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared counters, readable from any thread while the processor runs.
#[derive(Debug, Default)]
pub struct ProcessorMetrics {
    /// Processing cycles run
    pub cycles: AtomicU64,

    /// Cycles in which every channel published
    pub complete_cycles: AtomicU64,

    /// Frames written to the store
    pub frames_published: AtomicU64,

    /// Per-channel failures (not attached, bad size, encode error)
    pub channel_failures: AtomicU64,

    /// Negative latencies observed
    pub clock_skew: AtomicU64,

    /// Signal waits that timed out
    pub idle_waits: AtomicU64,
}

impl ProcessorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cycle(&self, published: usize, failures: usize) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        if failures == 0 {
            self.complete_cycles.fetch_add(1, Ordering::Relaxed);
        }
        self.frames_published
            .fetch_add(published as u64, Ordering::Relaxed);
        self.channel_failures
            .fetch_add(failures as u64, Ordering::Relaxed);
    }

    pub fn record_clock_skew(&self) {
        self.clock_skew.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_idle(&self) {
        self.idle_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProcessorMetricsSnapshot {
        ProcessorMetricsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            complete_cycles: self.complete_cycles.load(Ordering::Relaxed),
            frames_published: self.frames_published.load(Ordering::Relaxed),
            channel_failures: self.channel_failures.load(Ordering::Relaxed),
            clock_skew: self.clock_skew.load(Ordering::Relaxed),
            idle_waits: self.idle_waits.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorMetricsSnapshot {
    pub cycles: u64,
    pub complete_cycles: u64,
    pub frames_published: u64,
    pub channel_failures: u64,
    pub clock_skew: u64,
    pub idle_waits: u64,
}
