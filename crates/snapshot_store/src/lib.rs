//! # Snapshot Store
//!
//! 进程内唯一的可变共享状态。所有类型只暴露 update / snapshot 方法，
//! 锁在内部管理，调用方拿到的永远是完整拷贝。
//!
//! - [`FrameStore`]：每个图像通道最近一次编码结果
//! - [`TelemetryMirror`]：多写者遥测字段（写入时派生字段）
//! - [`BridgeStateCell`]：生产者上报的机械臂/夹爪/底盘状态
//! - [`LatencyHistory`]：每通道最近 N 个延迟样本

mod bridge_state;
mod frame_store;
mod latency;
mod telemetry;

pub use bridge_state::BridgeStateCell;
pub use frame_store::FrameStore;
pub use latency::{LatencyHistory, LatencySummary};
pub use telemetry::TelemetryMirror;
