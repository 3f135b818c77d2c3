//! BridgeBlueprint - Config Loader 输出
//!
//! 描述完整的桥接配置：服务端口、生产者链路、通道、处理参数、推送频率。

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{
    ChannelDescriptor, ChannelRegistry, ContractError, SubscriberRole, TelemetrySchema,
    DEFAULT_READY_TAG,
};

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的桥接配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// HTTP / WebSocket 服务设置
    #[serde(default)]
    pub server: ServerConfig,

    /// 生产者链路
    #[serde(default)]
    pub producer: ProducerConfig,

    /// 共享内存图像通道列表
    pub channels: Vec<ChannelDescriptor>,

    /// 帧处理参数
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// 各订阅角色推送频率
    #[serde(default)]
    pub cadence: CadenceConfig,

    /// 遥测初始值
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// 服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,

    /// Prometheus 端口 (0 = 禁用)
    #[serde(default)]
    pub metrics_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            metrics_port: 0,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

/// 生产者链路模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProducerMode {
    /// UDP/JSON 数据报
    #[default]
    Udp,
    /// 内置模拟生产者 (无需仿真器)
    Mock,
}

/// 生产者链路配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerConfig {
    #[serde(default)]
    pub mode: ProducerMode,

    /// 接收事件的本地地址
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// 发送消息的生产者地址
    #[serde(default = "default_remote_addr")]
    pub remote_addr: String,

    /// 出站消息队列容量
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,

    /// 模拟模式下 ready 信号频率 (Hz)
    #[serde(default = "default_mock_signal_hz")]
    pub mock_signal_hz: f64,

    /// 模拟模式下 GUI 遥测频率 (Hz)
    #[serde(default = "default_mock_gui_hz")]
    pub mock_gui_hz: f64,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            mode: ProducerMode::default(),
            listen_addr: default_listen_addr(),
            remote_addr: default_remote_addr(),
            outbound_capacity: default_outbound_capacity(),
            mock_signal_hz: default_mock_signal_hz(),
            mock_gui_hz: default_mock_gui_hz(),
        }
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:9870".to_string()
}

fn default_remote_addr() -> String {
    "127.0.0.1:9871".to_string()
}

fn default_outbound_capacity() -> usize {
    64
}

fn default_mock_signal_hz() -> f64 {
    30.0
}

fn default_mock_gui_hz() -> f64 {
    10.0
}

/// 帧处理配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// 彩色图 JPEG 质量 (1-100)
    #[serde(default = "default_quality")]
    pub jpeg_quality: u8,

    /// 深度图 JPEG 质量 (1-100)
    #[serde(default = "default_quality")]
    pub depth_quality: u8,

    /// 触发处理的信号标签
    #[serde(default = "default_ready_tag")]
    pub ready_tag: String,

    /// 信号等待超时 (ms)
    #[serde(default = "default_signal_timeout_ms")]
    pub signal_timeout_ms: u64,

    /// 共享内存重试间隔 (ms)
    #[serde(default = "default_attach_retry_ms")]
    pub attach_retry_ms: u64,

    /// 每通道保留的延迟样本数
    #[serde(default = "default_latency_history")]
    pub latency_history: usize,

    /// 延迟汇总日志间隔 (ms)
    #[serde(default = "default_latency_log_interval_ms")]
    pub latency_log_interval_ms: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: default_quality(),
            depth_quality: default_quality(),
            ready_tag: default_ready_tag(),
            signal_timeout_ms: default_signal_timeout_ms(),
            attach_retry_ms: default_attach_retry_ms(),
            latency_history: default_latency_history(),
            latency_log_interval_ms: default_latency_log_interval_ms(),
        }
    }
}

impl ProcessingConfig {
    pub fn signal_timeout(&self) -> Duration {
        Duration::from_millis(self.signal_timeout_ms)
    }

    pub fn attach_retry(&self) -> Duration {
        Duration::from_millis(self.attach_retry_ms)
    }

    pub fn latency_log_interval(&self) -> Duration {
        Duration::from_millis(self.latency_log_interval_ms)
    }
}

fn default_quality() -> u8 {
    15
}

fn default_ready_tag() -> String {
    DEFAULT_READY_TAG.to_string()
}

fn default_signal_timeout_ms() -> u64 {
    1000
}

fn default_attach_retry_ms() -> u64 {
    1000
}

fn default_latency_history() -> usize {
    100
}

fn default_latency_log_interval_ms() -> u64 {
    5000
}

/// 推送频率 (Hz)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CadenceConfig {
    #[serde(default = "default_data_hz")]
    pub data_hz: f64,

    #[serde(default = "default_image_hz")]
    pub image_hz: f64,

    #[serde(default = "default_control_hz")]
    pub control_hz: f64,

    #[serde(default = "default_bridge_hz")]
    pub bridge_hz: f64,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            data_hz: default_data_hz(),
            image_hz: default_image_hz(),
            control_hz: default_control_hz(),
            bridge_hz: default_bridge_hz(),
        }
    }
}

impl CadenceConfig {
    pub fn hz(&self, role: SubscriberRole) -> f64 {
        match role {
            SubscriberRole::Data => self.data_hz,
            SubscriberRole::Image => self.image_hz,
            SubscriberRole::Control => self.control_hz,
            SubscriberRole::Bridge => self.bridge_hz,
        }
    }

    /// Tick period for a role. Callers validate `hz > 0` beforehand.
    pub fn period(&self, role: SubscriberRole) -> Duration {
        Duration::from_secs_f64(1.0 / self.hz(role))
    }
}

fn default_data_hz() -> f64 {
    20.0
}

fn default_image_hz() -> f64 {
    25.0
}

fn default_control_hz() -> f64 {
    20.0
}

fn default_bridge_hz() -> f64 {
    100.0
}

/// 遥测初始值
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_robot_status")]
    pub initial_robot_status: String,

    #[serde(default = "default_battery")]
    pub initial_battery: f64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            initial_robot_status: default_robot_status(),
            initial_battery: default_battery(),
        }
    }
}

impl TelemetryConfig {
    pub fn to_schema(&self) -> TelemetrySchema {
        TelemetrySchema::teleop(&self.initial_robot_status, self.initial_battery)
    }
}

fn default_robot_status() -> String {
    "E-Stop".to_string()
}

fn default_battery() -> f64 {
    32.0
}

impl BridgeBlueprint {
    /// Three 640x480 RGB channels: mobile base, hand and map views.
    pub fn default_channels() -> Vec<ChannelDescriptor> {
        vec![
            ChannelDescriptor::color("mobile_rgb", 480, 640),
            ChannelDescriptor::color("hand_rgb", 480, 640),
            ChannelDescriptor::color("map", 480, 640),
        ]
    }

    /// Build the channel registry from the configured channel list.
    pub fn to_registry(&self) -> Result<ChannelRegistry, ContractError> {
        ChannelRegistry::new(self.channels.clone())
    }

    pub fn total_region_bytes(&self) -> usize {
        self.channels.iter().map(ChannelDescriptor::byte_size).sum()
    }
}

impl Default for BridgeBlueprint {
    fn default() -> Self {
        Self {
            version: ConfigVersion::V1,
            server: ServerConfig::default(),
            producer: ProducerConfig::default(),
            channels: Self::default_channels(),
            processing: ProcessingConfig::default(),
            cadence: CadenceConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_teleop_gui() {
        let blueprint = BridgeBlueprint::default();
        assert_eq!(blueprint.server.port, 8000);
        assert_eq!(blueprint.processing.jpeg_quality, 15);
        assert_eq!(blueprint.processing.ready_tag, "new_images_ready");
        assert_eq!(blueprint.processing.latency_history, 100);
        assert_eq!(blueprint.cadence.period(SubscriberRole::Data), Duration::from_millis(50));
        assert_eq!(blueprint.cadence.period(SubscriberRole::Image), Duration::from_millis(40));
        assert_eq!(blueprint.cadence.period(SubscriberRole::Bridge), Duration::from_millis(10));
        assert_eq!(blueprint.channels.len(), 3);
        assert_eq!(blueprint.total_region_bytes(), 3 * 480 * 640 * 3);
    }

    #[test]
    fn registry_preserves_channel_order() {
        let registry = BridgeBlueprint::default().to_registry().unwrap();
        let ids: Vec<&str> = registry.ids().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["mobile_rgb", "hand_rgb", "map"]);
    }

    #[test]
    fn telemetry_schema_uses_configured_initial_values() {
        let config = TelemetryConfig {
            initial_robot_status: "IDLE".into(),
            initial_battery: 90.0,
        };
        let schema = config.to_schema();
        let status = schema
            .fields()
            .find(|(name, _)| name == "robot_status")
            .map(|(_, v)| v.clone());
        assert_eq!(status, Some("IDLE".into()));
    }
}
