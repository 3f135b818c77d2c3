//! Latest encoded payload per image channel.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use contracts::{
    CapturedFrame, ChannelId, ChannelRegistry, ContractError, FrameStoreSnapshot, PLACEHOLDER,
};
use tracing::trace;

#[derive(Debug, Clone)]
struct Slot {
    payload: String,
    /// Capture time of `payload`; `None` while it is the placeholder
    capture_timestamp_ns: Option<i64>,
}

impl Slot {
    fn placeholder() -> Self {
        Self {
            payload: PLACEHOLDER.to_string(),
            capture_timestamp_ns: None,
        }
    }
}

/// Last-write-wins store keyed by channel.
///
/// Every configured channel has a key from construction on; writes to
/// unknown channels are rejected so the key set never changes.
#[derive(Debug)]
pub struct FrameStore {
    slots: Mutex<BTreeMap<ChannelId, Slot>>,
}

impl FrameStore {
    pub fn new(registry: &ChannelRegistry) -> Self {
        let slots = registry
            .ids()
            .map(|id| (id.clone(), Slot::placeholder()))
            .collect();
        Self {
            slots: Mutex::new(slots),
        }
    }

    /// Overwrite one channel's payload.
    pub fn update(&self, channel_id: &str, payload: impl Into<String>) -> Result<(), ContractError> {
        let mut slots = self.lock();
        let slot = slots
            .get_mut(channel_id)
            .ok_or_else(|| ContractError::unknown_channel(channel_id))?;
        slot.payload = payload.into();
        slot.capture_timestamp_ns = None;
        Ok(())
    }

    /// Publish one processing cycle under a single lock.
    ///
    /// `frames` overwrite their channel, `failed` channels drop back to the
    /// placeholder, every other channel keeps its value. Returns the number
    /// of entries written.
    pub fn apply_cycle(&self, frames: Vec<CapturedFrame>, failed: &[ChannelId]) -> usize {
        let mut slots = self.lock();
        let mut written = 0;

        for frame in frames {
            if let Some(slot) = slots.get_mut(&frame.channel_id) {
                slot.payload = frame.encoded_payload;
                slot.capture_timestamp_ns = Some(frame.capture_timestamp_ns);
                written += 1;
            } else {
                trace!(channel = %frame.channel_id, "frame for unconfigured channel dropped");
            }
        }

        for channel_id in failed {
            if let Some(slot) = slots.get_mut(channel_id) {
                *slot = Slot::placeholder();
                written += 1;
            }
        }
        written
    }

    /// Full copy of every channel.
    pub fn snapshot(&self) -> FrameStoreSnapshot {
        let slots = self.lock();
        FrameStoreSnapshot {
            images: slots
                .iter()
                .map(|(id, slot)| (id.clone(), slot.payload.clone()))
                .collect(),
        }
    }

    /// Age of each channel's current payload at `now_ns`.
    ///
    /// `None` for channels still at the placeholder.
    pub fn ages_ms(&self, now_ns: i64) -> BTreeMap<ChannelId, Option<f64>> {
        let slots = self.lock();
        slots
            .iter()
            .map(|(id, slot)| {
                let age = slot
                    .capture_timestamp_ns
                    .map(|ts| contracts::latency_ms(ts, now_ns));
                (id.clone(), age)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<ChannelId, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
