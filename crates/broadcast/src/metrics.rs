//! Subscriber metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for a single subscriber
#[derive(Debug, Default)]
pub struct SubscriberMetrics {
    /// Snapshots written to the connection
    delivered: AtomicU64,
    /// Snapshots overwritten before this subscriber could take them
    skipped: AtomicU64,
    /// Failed sends (at most one, the connection is dropped after it)
    failures: AtomicU64,
}

impl SubscriberMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn inc_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn add_skipped(&self, n: u64) {
        self.skipped.fetch_add(n, Ordering::Relaxed);
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn inc_failures(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy
    pub fn snapshot(&self) -> SubscriberMetricsSnapshot {
        SubscriberMetricsSnapshot {
            delivered: self.delivered(),
            skipped: self.skipped(),
            failures: self.failures(),
        }
    }
}

/// Snapshot of subscriber metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriberMetricsSnapshot {
    pub delivered: u64,
    pub skipped: u64,
    pub failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_snapshot() {
        let metrics = SubscriberMetrics::new();
        metrics.inc_delivered();
        metrics.inc_delivered();
        metrics.add_skipped(3);
        metrics.inc_failures();

        assert_eq!(
            metrics.snapshot(),
            SubscriberMetricsSnapshot {
                delivered: 2,
                skipped: 3,
                failures: 1
            }
        );
    }
}
