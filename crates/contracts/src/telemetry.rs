//! Telemetry types - TelemetryMirror content
//!
//! A fixed set of named fields, each a scalar, a fixed-length vector, a
//! status string or a flag.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Index;

/// Field names used by the bridge.
pub mod fields {
    pub const ROBOT_STATUS: &str = "robot_status";
    pub const BATTERY: &str = "battery";
    pub const LINEAR_SPEED: &str = "linear_speed";
    pub const ANGULAR_SPEED: &str = "angular_speed";
    pub const GRIPPER_OPENING: &str = "gripper_opening";
    pub const JOINT_ANGLES: &str = "joint_angles";
    pub const CARTESIAN_POSITION: &str = "cartesian_position";
    pub const FORCE_SENSOR: &str = "force_sensor";
    pub const MASTER_JOINT_ANGLES: &str = "master_joint_angles";
    pub const ANGLE: &str = "angle";
    pub const ACCEL: &str = "accel";
    pub const BRAKE: &str = "brake";
    pub const GEAR_STATUS: &str = "gear_status";
}

/// A single telemetry value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TelemetryValue {
    Flag(bool),
    Number(f64),
    Vector(Vec<f64>),
    Text(String),
}

impl TelemetryValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_slice(&self) -> Option<&[f64]> {
        match self {
            Self::Vector(v) => Some(v),
            _ => None,
        }
    }
}

impl From<f64> for TelemetryValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<Vec<f64>> for TelemetryValue {
    fn from(v: Vec<f64>) -> Self {
        Self::Vector(v)
    }
}

impl From<&[f64]> for TelemetryValue {
    fn from(v: &[f64]) -> Self {
        Self::Vector(v.to_vec())
    }
}

impl From<&str> for TelemetryValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for TelemetryValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<bool> for TelemetryValue {
    fn from(v: bool) -> Self {
        Self::Flag(v)
    }
}

impl PartialEq<f64> for TelemetryValue {
    fn eq(&self, other: &f64) -> bool {
        self.as_f64() == Some(*other)
    }
}

impl PartialEq<&str> for TelemetryValue {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

impl<const N: usize> PartialEq<[f64; N]> for TelemetryValue {
    fn eq(&self, other: &[f64; N]) -> bool {
        self.as_slice() == Some(other.as_slice())
    }
}

/// Copy of every telemetry field at read time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorSnapshot(pub BTreeMap<String, TelemetryValue>);

impl SensorSnapshot {
    pub fn get(&self, field: &str) -> Option<&TelemetryValue> {
        self.0.get(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TelemetryValue)> {
        self.0.iter()
    }
}

impl<'a> Index<&'a str> for SensorSnapshot {
    type Output = TelemetryValue;

    /// Panics on an undeclared field, like `BTreeMap` indexing.
    fn index(&self, field: &'a str) -> &Self::Output {
        &self.0[field]
    }
}

/// Declared fields and their initial values.
#[derive(Debug, Clone)]
pub struct TelemetrySchema {
    fields: Vec<(String, TelemetryValue)>,
}

impl TelemetrySchema {
    pub fn new(fields: Vec<(String, TelemetryValue)>) -> Self {
        Self { fields }
    }

    /// Teleoperation GUI field set with the robot in E-Stop.
    pub fn teleop(initial_robot_status: &str, initial_battery: f64) -> Self {
        let zeros = || TelemetryValue::Vector(vec![0.0; 6]);
        Self::new(vec![
            (fields::ROBOT_STATUS.into(), initial_robot_status.into()),
            (fields::BATTERY.into(), initial_battery.into()),
            (fields::LINEAR_SPEED.into(), TelemetryValue::Number(0.0)),
            (fields::ANGULAR_SPEED.into(), TelemetryValue::Number(0.0)),
            (fields::GRIPPER_OPENING.into(), TelemetryValue::Number(0.0)),
            (
                fields::JOINT_ANGLES.into(),
                vec![0.0, 0.0, 90.0, 90.0, 90.0, 90.0].into(),
            ),
            (fields::CARTESIAN_POSITION.into(), zeros()),
            (fields::FORCE_SENSOR.into(), zeros()),
            (fields::MASTER_JOINT_ANGLES.into(), zeros()),
            (fields::ANGLE.into(), TelemetryValue::Number(0.0)),
            (fields::ACCEL.into(), TelemetryValue::Number(0.0)),
            (fields::BRAKE.into(), TelemetryValue::Number(0.0)),
            (fields::GEAR_STATUS.into(), "neutral".into()),
        ])
    }

    pub fn fields(&self) -> impl Iterator<Item = &(String, TelemetryValue)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Default for TelemetrySchema {
    fn default() -> Self {
        Self::teleop("E-Stop", 32.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untagged_values_deserialize() {
        let v: TelemetryValue = serde_json::from_str("42").unwrap();
        assert_eq!(v, 42.0);
        let v: TelemetryValue = serde_json::from_str("[1, 2.5]").unwrap();
        assert_eq!(v, [1.0, 2.5]);
        let v: TelemetryValue = serde_json::from_str("\"AUTO\"").unwrap();
        assert_eq!(v, "AUTO");
        let v: TelemetryValue = serde_json::from_str("true").unwrap();
        assert_eq!(v, TelemetryValue::Flag(true));
    }

    #[test]
    fn default_schema_has_initial_values() {
        let schema = TelemetrySchema::default();
        let map: BTreeMap<_, _> = schema.fields().cloned().collect();
        assert_eq!(map[fields::ROBOT_STATUS], "E-Stop");
        assert_eq!(map[fields::BATTERY], 32.0);
        assert_eq!(map[fields::JOINT_ANGLES], [0.0, 0.0, 90.0, 90.0, 90.0, 90.0]);
        assert_eq!(map[fields::GEAR_STATUS], "neutral");
        assert_eq!(schema.len(), 13);
    }

    #[test]
    fn snapshot_serializes_as_flat_object() {
        let mut map = BTreeMap::new();
        map.insert("battery".to_string(), TelemetryValue::Number(42.0));
        map.insert("gear_status".to_string(), TelemetryValue::from("forward"));
        let json = serde_json::to_string(&SensorSnapshot(map)).unwrap();
        assert_eq!(json, r#"{"battery":42.0,"gear_status":"forward"}"#);
    }
}
