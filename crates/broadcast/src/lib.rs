//! # Broadcast
//!
//! 订阅端扇出与命令转发。
//!
//! - [`BroadcastHub`]: 每个角色一个定时器，快照写入 `watch`，每个订阅者独立写任务（只保留最新快照）
//! - [`CommandRelay`]: `control` / `bridge` 连接的接收方向，命令转发给生产端并镜像到遥测
//! - [`SettingsChannel`]: 数据集设置 / 录制控制，一问一答
//!
//! 单个订阅者的慢写或断开不会影响其他订阅者。

mod error;
mod hub;
mod memory;
mod metrics;
mod relay;
mod settings;

pub use error::{BroadcastError, Result};
pub use hub::{BroadcastHub, DeliveryOutcome, HubSources, Published, RoleSnapshot, Subscription};
pub use memory::{memory_sink, memory_source, MemorySink, MemorySource};
pub use metrics::{SubscriberMetrics, SubscriberMetricsSnapshot};
pub use relay::{CommandRelay, RelayStats, LEGACY_JOINT_KEY};
pub use settings::{
    SettingsChannel, SettingsStats, ACK_DATASET_SETTINGS, ERR_NOT_JSON, ERR_UNKNOWN_TYPE,
};
