//! ControlValue - teleoperation command / bridge state
//!
//! The same structure travels both ways: a subscriber sends it as a command
//! (`master_info`), the producer reports it back as the robot state
//! (`slave_info`). Every field is optional on the wire and falls back to a
//! neutral default, so partial payloads are never rejected.

use serde::{Deserialize, Serialize};

/// Default arm pose in degrees.
pub const DEFAULT_ARM_POSITION: [f64; 6] = [0.0, 0.0, 90.0, 90.0, 90.0, 90.0];

/// Arm joint targets / readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotarmValue {
    pub position: Vec<f64>,
    pub velocity: Vec<f64>,
    pub force: Vec<f64>,
}

impl Default for RobotarmValue {
    fn default() -> Self {
        Self {
            position: DEFAULT_ARM_POSITION.to_vec(),
            velocity: vec![0.0; 6],
            force: vec![0.0; 6],
        }
    }
}

/// Gripper target / reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GripperValue {
    pub position: f64,
    pub velocity: f64,
    pub force: f64,
}

/// Mobile base target / reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MobileValue {
    pub linear_accel: f64,
    pub linear_brake: f64,
    pub steer: f64,
    pub gear: bool,
}

impl Default for MobileValue {
    fn default() -> Self {
        Self {
            linear_accel: 0.0,
            linear_brake: 0.0,
            steer: 0.0,
            gear: true,
        }
    }
}

/// Full arm/gripper/mobile value set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlValue {
    pub stamp: f64,

    #[serde(rename = "RobotarmValue")]
    pub robotarm: RobotarmValue,

    #[serde(rename = "GripperValue")]
    pub gripper: GripperValue,

    #[serde(rename = "MobileValue")]
    pub mobile: MobileValue,
}

/// Command received from a subscriber.
pub type ControlCommand = ControlValue;

/// State reported by the producer and served to `control`/`bridge` subscribers.
pub type BridgeState = ControlValue;

impl ControlValue {
    /// Command built from a bare joint vector (`{"master_joint_values": [...]}`).
    pub fn from_joint_values(position: Vec<f64>) -> Self {
        Self {
            robotarm: RobotarmValue {
                position,
                ..RobotarmValue::default()
            },
            ..Self::default()
        }
    }

    /// Gripper opening shown in the GUI, `clamp((100 - position) * 1.5, 0, 150)`.
    pub fn gripper_opening(&self) -> f64 {
        ((100.0 - self.gripper.position) * 1.5).clamp(0.0, 150.0)
    }
}

/// Direction shown next to the throttle gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GearStatus {
    Forward,
    Reverse,
    Neutral,
}

impl GearStatus {
    /// Sign of the acceleration; exactly zero (and NaN) is neutral.
    pub fn from_accel(accel: f64) -> Self {
        if accel > 0.0 {
            Self::Forward
        } else if accel < 0.0 {
            Self::Reverse
        } else {
            Self::Neutral
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Reverse => "reverse",
            Self::Neutral => "neutral",
        }
    }
}
