//! Settings channel messages
//!
//! `{"type": "dataset_setting", ...}` merges into the current dataset
//! settings; `{"type": "start_recording" | "save_recording" | "discard_recording"}`
//! is forwarded as a recording state change.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotArmSelection {
    pub position: bool,
    pub velocity: bool,
    pub current: bool,
    pub gripper: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MobileSelection {
    pub linear_velocity: bool,
    pub angular_velocity: bool,
    pub odom: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSelection {
    pub camera1: bool,
    pub camera2: bool,
    pub lidar: bool,
    pub map: bool,
}

/// Dataset recording settings, forwarded to the producer as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSettings {
    #[serde(rename = "robotArm")]
    pub robot_arm: RobotArmSelection,
    pub mobile: MobileSelection,
    pub sensors: SensorSelection,
    #[serde(rename = "HZ")]
    pub hz: u32,
    #[serde(rename = "savePath")]
    pub save_path: String,
    #[serde(rename = "saveTask")]
    pub save_task: String,
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(rename = "fileFormat")]
    pub file_format: String,
}

impl Default for DatasetSettings {
    fn default() -> Self {
        Self {
            robot_arm: RobotArmSelection::default(),
            mobile: MobileSelection::default(),
            sensors: SensorSelection::default(),
            hz: 10,
            save_path: ".".into(),
            save_task: "pick_and_place red cube".into(),
            file_name: "data_1".into(),
            file_format: "json".into(),
        }
    }
}

/// Body of a `dataset_setting` message; absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DatasetSettingsUpdate {
    #[serde(rename = "robotArm")]
    pub robot_arm: Option<RobotArmSelection>,
    pub mobile: Option<MobileSelection>,
    pub sensors: Option<SensorSelection>,
    #[serde(rename = "Hertz")]
    pub hertz: Option<u32>,
    #[serde(rename = "savePath")]
    pub save_path: Option<String>,
    #[serde(rename = "saveTask")]
    pub save_task: Option<String>,
    #[serde(rename = "fileName")]
    pub file_name: Option<String>,
    #[serde(rename = "fileFormat")]
    pub file_format: Option<String>,
}

impl DatasetSettings {
    /// Merge an update over the current values.
    pub fn merge(&mut self, update: DatasetSettingsUpdate) {
        if let Some(v) = update.robot_arm {
            self.robot_arm = v;
        }
        if let Some(v) = update.mobile {
            self.mobile = v;
        }
        if let Some(v) = update.sensors {
            self.sensors = v;
        }
        if let Some(v) = update.hertz {
            self.hz = v;
        }
        if let Some(v) = update.save_path {
            self.save_path = v;
        }
        if let Some(v) = update.save_task {
            self.save_task = v;
        }
        if let Some(v) = update.file_name {
            self.file_name = v;
        }
        if let Some(v) = update.file_format {
            self.file_format = v;
        }
    }
}

/// Recording state change requested from the GUI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingCommand {
    StartRecording,
    SaveRecording,
    DiscardRecording,
}

impl RecordingCommand {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "start_recording" => Some(Self::StartRecording),
            "save_recording" => Some(Self::SaveRecording),
            "discard_recording" => Some(Self::DiscardRecording),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::StartRecording => "start_recording",
            Self::SaveRecording => "save_recording",
            Self::DiscardRecording => "discard_recording",
        }
    }
}

/// Parsed settings channel message.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsMessage {
    DatasetSetting(DatasetSettingsUpdate),
    Recording(RecordingCommand),
    /// `type` missing or not recognised.
    Unknown(Option<String>),
}

impl SettingsMessage {
    /// Classify an already-parsed JSON payload by its `type` field.
    pub fn from_json(payload: serde_json::Value) -> Result<Self, serde_json::Error> {
        let msg_type = payload
            .get("type")
            .and_then(|t| t.as_str())
            .map(str::to_owned);

        match msg_type.as_deref() {
            Some("dataset_setting") => Ok(Self::DatasetSetting(serde_json::from_value(payload)?)),
            Some(other) => Ok(RecordingCommand::parse(other)
                .map(Self::Recording)
                .unwrap_or(Self::Unknown(msg_type))),
            None => Ok(Self::Unknown(None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_keeps_absent_fields() {
        let mut settings = DatasetSettings::default();
        let msg = SettingsMessage::from_json(json!({
            "type": "dataset_setting",
            "Hertz": 30,
            "fileName": "run_7",
            "sensors": {"camera1": true}
        }))
        .unwrap();

        let SettingsMessage::DatasetSetting(update) = msg else {
            panic!("expected dataset_setting");
        };
        settings.merge(update);

        assert_eq!(settings.hz, 30);
        assert_eq!(settings.file_name, "run_7");
        assert!(settings.sensors.camera1);
        assert!(!settings.sensors.lidar);
        assert_eq!(settings.save_path, ".");
        assert_eq!(settings.file_format, "json");
    }

    #[test]
    fn serialized_settings_use_gui_names() {
        let json = serde_json::to_value(DatasetSettings::default()).unwrap();
        assert_eq!(json["HZ"], 10);
        assert_eq!(json["robotArm"]["gripper"], false);
        assert_eq!(json["mobile"]["linearVelocity"], false);
        assert_eq!(json["saveTask"], "pick_and_place red cube");
    }

    #[test]
    fn classify_message_types() {
        assert_eq!(
            SettingsMessage::from_json(json!({"type": "save_recording"})).unwrap(),
            SettingsMessage::Recording(RecordingCommand::SaveRecording)
        );
        assert_eq!(
            SettingsMessage::from_json(json!({"type": "reboot"})).unwrap(),
            SettingsMessage::Unknown(Some("reboot".into()))
        );
        assert_eq!(
            SettingsMessage::from_json(json!({"Hertz": 5})).unwrap(),
            SettingsMessage::Unknown(None)
        );
    }
}
