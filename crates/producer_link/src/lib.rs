//! # Producer Link
//!
//! 生产者侧集成。唯一的 [`ProducerWorker`] 独占生产者客户端：
//! 入站事件写入 SignalWaiter / TelemetryMirror / BridgeStateCell，
//! 出站消息经有界队列 ([`ProducerHandle`]) 发送，队列满时丢弃。
//!
//! ## 传输
//!
//! - [`UdpProducerClient`]：UDP 数据报，每个数据报一个 JSON 对象 (`topic` 标签)
//! - [`MockProducerClient`] + [`MockProducerRemote`]：进程内链路
//! - [`SimulatedProducer`]：mock 模式下的模拟生产者

mod client;
pub mod error;
mod mock;
mod simulated;
mod udp;
mod worker;

pub use client::ProducerClient;
pub use error::{ProducerLinkError, Result};
pub use mock::{mock_link, MockProducerClient, MockProducerRemote, SENT_LOG_CAPACITY};
pub use simulated::SimulatedProducer;
pub use udp::UdpProducerClient;
pub use worker::{EventTargets, ProducerHandle, ProducerWorker, WorkerStats, AUTO_STATUS};
