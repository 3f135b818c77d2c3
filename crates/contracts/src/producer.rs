//! Producer link envelopes
//!
//! Events flow producer → bridge, messages flow bridge → producer. The
//! payload of each topic is opaque to everything except the producer worker.

use serde::{Deserialize, Serialize};

use crate::{ControlValue, ReadySignal};

/// Robot telemetry published for the GUI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuiValue {
    pub battery: f64,
    pub linear_accel: f64,
    pub steer: f64,
    pub gripper_opening: f64,
    pub joint_angles: Vec<f64>,
    pub cartesian_position: Vec<f64>,
    pub force_torque: Vec<f64>,
}

/// Inbound producer event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topic", rename_all = "snake_case")]
pub enum ProducerEvent {
    /// Frames for this capture time are in shared memory.
    ImageSignal(ReadySignal),
    RobotToGui(GuiValue),
    /// Robot-side arm/gripper/mobile state.
    SlaveInfo(ControlValue),
    CartesianPosition { data: Vec<f64> },
}

impl ProducerEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            Self::ImageSignal(_) => "image_signal",
            Self::RobotToGui(_) => "robot_to_gui",
            Self::SlaveInfo(_) => "slave_info",
            Self::CartesianPosition { .. } => "cartesian_position",
        }
    }
}

/// Outbound message to the producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topic", rename_all = "snake_case")]
pub enum ProducerMessage {
    /// Operator command for the robot.
    MasterInfo(ControlValue),
    /// Serialized `DatasetSettings`.
    DatasetSettings { data: String },
    RecordingState { data: String },
}

impl ProducerMessage {
    pub fn topic(&self) -> &'static str {
        match self {
            Self::MasterInfo(_) => "master_info",
            Self::DatasetSettings { .. } => "dataset_settings",
            Self::RecordingState { .. } => "recording_state",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_topics_on_the_wire() {
        let json = r#"{"topic":"robot_to_gui","battery":87.5,"joint_angles":[1,2,3,4,5,6]}"#;
        let event: ProducerEvent = serde_json::from_str(json).unwrap();
        let ProducerEvent::RobotToGui(gui) = &event else {
            panic!("expected robot_to_gui");
        };
        assert_eq!(gui.battery, 87.5);
        assert_eq!(gui.joint_angles, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(gui.force_torque.is_empty());
        assert_eq!(event.topic(), "robot_to_gui");

        let json = r#"{"topic":"image_signal","stamp":{"sec":2,"nanosec":0},"frame_id":"new_images_ready"}"#;
        let event: ProducerEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, ProducerEvent::ImageSignal(ref s) if s.capture_timestamp_ns() == Some(2_000_000_000)));

        let json = r#"{"topic":"slave_info","MobileValue":{"steer":0.5}}"#;
        let event: ProducerEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, ProducerEvent::SlaveInfo(ref v) if v.mobile.steer == 0.5));
    }

    #[test]
    fn message_topics_on_the_wire() {
        let msg = ProducerMessage::RecordingState {
            data: "start_recording".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["topic"], "recording_state");
        assert_eq!(json["data"], "start_recording");

        let json = serde_json::to_value(ProducerMessage::MasterInfo(ControlValue::default())).unwrap();
        assert_eq!(json["topic"], "master_info");
        assert_eq!(json["MobileValue"]["gear"], true);
    }
}
