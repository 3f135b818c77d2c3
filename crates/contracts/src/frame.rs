//! Frame types - FrameProcessor output / FrameStore content
//!
//! Time model: producer capture stamps and local receive stamps are both
//! nanoseconds since the UNIX epoch, carried as `i64` so skew shows up as a
//! negative latency instead of an underflow.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ChannelId;

/// Value stored for a channel that has no valid current data.
pub const PLACEHOLDER: &str = "";

/// Tag carried by the ready-signal that triggers a processing cycle.
pub const DEFAULT_READY_TAG: &str = "new_images_ready";

/// `(receive - capture) / 1e6`
///
/// Negative results are returned as-is; callers decide how to report them.
#[inline]
pub fn latency_ms(capture_timestamp_ns: i64, receive_timestamp_ns: i64) -> f64 {
    receive_timestamp_ns.saturating_sub(capture_timestamp_ns) as f64 / 1_000_000.0
}

/// Producer-side time stamp, split like a ROS `builtin_interfaces/Time`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamp {
    #[serde(default)]
    pub sec: i64,
    #[serde(default)]
    pub nanosec: u32,
}

impl Stamp {
    pub fn from_nanos(ns: i64) -> Self {
        Self {
            sec: ns.div_euclid(1_000_000_000),
            nanosec: ns.rem_euclid(1_000_000_000) as u32,
        }
    }

    /// `None` when the stamp does not fit in `i64` nanoseconds.
    pub fn to_nanos(self) -> Option<i64> {
        self.sec
            .checked_mul(1_000_000_000)?
            .checked_add(i64::from(self.nanosec))
    }
}

/// Out-of-band "frame ready" notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadySignal {
    pub stamp: Stamp,
    pub frame_id: String,
}

impl ReadySignal {
    pub fn new(capture_timestamp_ns: i64, tag: impl Into<String>) -> Self {
        Self {
            stamp: Stamp::from_nanos(capture_timestamp_ns),
            frame_id: tag.into(),
        }
    }

    pub fn capture_timestamp_ns(&self) -> Option<i64> {
        self.stamp.to_nanos()
    }
}

/// One successfully encoded image for one channel in one processing cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedFrame {
    pub channel_id: ChannelId,
    /// `data:image/jpeg;base64,...`
    pub encoded_payload: String,
    pub capture_timestamp_ns: i64,
    pub receive_timestamp_ns: i64,
}

impl CapturedFrame {
    pub fn latency_ms(&self) -> f64 {
        latency_ms(self.capture_timestamp_ns, self.receive_timestamp_ns)
    }

    /// Clock-sync invariant `receive >= capture`.
    pub fn is_clock_consistent(&self) -> bool {
        self.receive_timestamp_ns >= self.capture_timestamp_ns
    }
}

/// Full copy of the frame store: every configured channel, payload or placeholder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameStoreSnapshot {
    pub images: BTreeMap<ChannelId, String>,
}

impl FrameStoreSnapshot {
    pub fn get(&self, channel_id: &str) -> Option<&str> {
        self.images.get(channel_id).map(String::as_str)
    }

    /// True while no channel holds a real payload.
    pub fn is_all_placeholder(&self) -> bool {
        self.images.values().all(|v| v.is_empty())
    }

    pub fn populated(&self) -> usize {
        self.images.values().filter(|v| !v.is_empty()).count()
    }
}

/// Wire shape of an `image` role message.
#[derive(Debug, Clone, Serialize)]
pub struct ImageMessage<'a> {
    pub images: &'a BTreeMap<ChannelId, String>,
    pub server_send_timestamp_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_from_literal_timestamps() {
        assert_eq!(latency_ms(1_000_000_000, 1_005_000_000), 5.0);
        assert_eq!(latency_ms(1_005_000_000, 1_000_000_000), -5.0);
    }

    #[test]
    fn stamp_round_trips_nanos() {
        let stamp = Stamp::from_nanos(1_700_000_000_123_456_789);
        assert_eq!(stamp.sec, 1_700_000_000);
        assert_eq!(stamp.nanosec, 123_456_789);
        assert_eq!(stamp.to_nanos(), Some(1_700_000_000_123_456_789));
    }

    #[test]
    fn out_of_range_stamp_has_no_nanos() {
        let json = r#"{"stamp":{"sec":10000000000},"frame_id":"new_images_ready"}"#;
        let signal: ReadySignal = serde_json::from_str(json).unwrap();
        assert_eq!(signal.capture_timestamp_ns(), None);

        let stamp = Stamp {
            sec: i64::MAX / 1_000_000_000,
            nanosec: 999_999_999,
        };
        assert_eq!(stamp.to_nanos(), None);
    }

    #[test]
    fn latency_saturates_on_extreme_timestamps() {
        assert_eq!(latency_ms(i64::MIN, i64::MAX), i64::MAX as f64 / 1_000_000.0);
        assert_eq!(latency_ms(i64::MAX, i64::MIN), i64::MIN as f64 / 1_000_000.0);
    }

    #[test]
    fn ready_signal_wire_shape() {
        let json = r#"{"stamp":{"sec":1,"nanosec":5000000},"frame_id":"new_images_ready"}"#;
        let signal: ReadySignal = serde_json::from_str(json).unwrap();
        assert_eq!(signal.capture_timestamp_ns(), Some(1_005_000_000));
        assert_eq!(signal.frame_id, DEFAULT_READY_TAG);
    }

    #[test]
    fn snapshot_placeholder_detection() {
        let mut snapshot = FrameStoreSnapshot::default();
        snapshot.images.insert("mobile_rgb".into(), String::new());
        snapshot.images.insert("hand_rgb".into(), String::new());
        assert!(snapshot.is_all_placeholder());

        snapshot
            .images
            .insert("hand_rgb".into(), "data:image/jpeg;base64,AA==".into());
        assert!(!snapshot.is_all_placeholder());
        assert_eq!(snapshot.populated(), 1);
        assert_eq!(snapshot.get("mobile_rgb"), Some(PLACEHOLDER));
    }

    #[test]
    fn image_message_wire_shape() {
        let mut images = BTreeMap::new();
        images.insert(ChannelId::from("map"), "x".to_string());
        let msg = ImageMessage {
            images: &images,
            server_send_timestamp_ms: 42,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"images":{"map":"x"},"server_send_timestamp_ms":42}"#);
    }
}
