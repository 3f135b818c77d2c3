//! Bounded per-channel latency history
//!
//! Owned by the frame processor thread; only summaries leave it.

use std::collections::BTreeMap;
use std::fmt;

use contracts::ChannelId;
use ringbuf::{traits::*, HeapRb};

/// Aggregate over the samples currently held for one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySummary {
    pub count: usize,
    pub mean_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

impl fmt::Display for LatencySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mean={:.2}ms min={:.2}ms max={:.2}ms n={}",
            self.mean_ms, self.min_ms, self.max_ms, self.count
        )
    }
}

/// Last `capacity` latency samples per channel; oldest overwritten.
pub struct LatencyHistory {
    capacity: usize,
    samples: BTreeMap<ChannelId, HeapRb<f64>>,
}

impl fmt::Debug for LatencyHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LatencyHistory")
            .field("capacity", &self.capacity)
            .field("channels", &self.samples.len())
            .finish()
    }
}

impl LatencyHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            samples: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn record(&mut self, channel_id: &ChannelId, latency_ms: f64) {
        let capacity = self.capacity;
        self.samples
            .entry(channel_id.clone())
            .or_insert_with(|| HeapRb::new(capacity))
            .push_overwrite(latency_ms);
    }

    pub fn len(&self, channel_id: &str) -> usize {
        self.samples
            .get(channel_id)
            .map_or(0, |rb| rb.occupied_len())
    }

    pub fn summary(&self, channel_id: &str) -> Option<LatencySummary> {
        self.samples.get(channel_id).and_then(summarize)
    }

    /// Summaries for every channel with at least one sample.
    pub fn summaries(&self) -> Vec<(ChannelId, LatencySummary)> {
        self.samples
            .iter()
            .filter_map(|(id, rb)| summarize(rb).map(|s| (id.clone(), s)))
            .collect()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

fn summarize(rb: &HeapRb<f64>) -> Option<LatencySummary> {
    let count = rb.occupied_len();
    if count == 0 {
        return None;
    }
    let (mut sum, mut min, mut max) = (0.0, f64::INFINITY, f64::NEG_INFINITY);
    for &v in rb.iter() {
        sum += v;
        min = min.min(v);
        max = max.max(v);
    }
    Some(LatencySummary {
        count,
        mean_ms: sum / count as f64,
        min_ms: min,
        max_ms: max,
    })
}
