//! Bridge 指标收集模块
//!
//! 帧处理、共享内存挂载、订阅推送、命令转发、生产者链路的运行指标。

use std::collections::BTreeMap;

use metrics::{counter, gauge, histogram};

/// 记录单通道捕获到接收的延迟
pub fn record_frame_latency_ms(channel_id: &str, latency_ms: f64) {
    histogram!(
        "teleop_bridge_frame_latency_ms",
        "channel" => channel_id.to_string()
    )
    .record(latency_ms);
}

/// 当前帧的年龄 (捕获时间到现在)
pub fn record_frame_age_ms(channel_id: &str, age_ms: f64) {
    gauge!(
        "teleop_bridge_frame_age_ms",
        "channel" => channel_id.to_string()
    )
    .set(age_ms);
}

/// 记录编码失败 (通道本周期输出占位符)
pub fn record_encode_failure(channel_id: &str, reason: &'static str) {
    counter!(
        "teleop_bridge_encode_failures_total",
        "channel" => channel_id.to_string(),
        "reason" => reason
    )
    .increment(1);
}

/// 记录时钟偏差异常 (延迟为负)
pub fn record_clock_skew(channel_id: &str) {
    counter!(
        "teleop_bridge_clock_skew_anomalies_total",
        "channel" => channel_id.to_string()
    )
    .increment(1);
}

/// 记录一个处理周期
pub fn record_processing_cycle(published: usize, placeholders: usize) {
    counter!("teleop_bridge_processing_cycles_total").increment(1);
    if placeholders == 0 {
        counter!("teleop_bridge_complete_cycles_total").increment(1);
    }
    gauge!("teleop_bridge_channels_published").set(published as f64);
    gauge!("teleop_bridge_channels_placeholder").set(placeholders as f64);
}

/// 记录共享内存挂载尝试
pub fn record_attach_attempt(channel_id: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "teleop_bridge_attach_attempts_total",
        "channel" => channel_id.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 当前订阅者数量
pub fn set_subscribers(role: &'static str, count: usize) {
    gauge!("teleop_bridge_subscribers", "role" => role).set(count as f64);
}

/// 记录一次成功推送
pub fn record_delivery(role: &'static str) {
    counter!("teleop_bridge_deliveries_total", "role" => role).increment(1);
}

/// 记录被覆盖 (未送达) 的快照数
pub fn record_snapshots_skipped(role: &'static str, skipped: u64) {
    if skipped > 0 {
        counter!("teleop_bridge_snapshots_skipped_total", "role" => role).increment(skipped);
    }
}

/// 记录推送失败 (订阅者随后被移除)
pub fn record_delivery_failure(role: &'static str) {
    counter!("teleop_bridge_delivery_failures_total", "role" => role).increment(1);
}

/// 记录转发给生产者的命令
pub fn record_command_relayed(source: &'static str, accepted: bool) {
    let status = if accepted { "accepted" } else { "rejected" };
    counter!(
        "teleop_bridge_commands_total",
        "source" => source,
        "status" => status
    )
    .increment(1);
}

/// 记录设置通道消息
pub fn record_settings_message(outcome: &'static str) {
    counter!("teleop_bridge_settings_messages_total", "outcome" => outcome).increment(1);
}

/// 记录生产者事件
pub fn record_producer_event(topic: &'static str) {
    counter!("teleop_bridge_producer_events_total", "topic" => topic).increment(1);
}

/// 记录发往生产者的消息
pub fn record_producer_message(topic: &'static str, sent: bool) {
    let status = if sent { "sent" } else { "dropped" };
    counter!(
        "teleop_bridge_producer_messages_total",
        "topic" => topic,
        "status" => status
    )
    .increment(1);
}

/// 帧处理指标聚合器
///
/// 在内存中聚合指标，便于运行结束时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct BridgeMetricsAggregator {
    /// 处理周期数
    pub cycles: u64,

    /// 所有通道均成功的周期数
    pub complete_cycles: u64,

    /// 编码失败总数
    pub encode_failures: u64,

    /// 时钟偏差异常总数
    pub clock_skew: u64,

    /// 各通道延迟统计
    pub latency_stats: BTreeMap<String, RunningStats>,
}

impl BridgeMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个处理周期: 各成功通道的延迟和失败通道数
    pub fn record_cycle<'a>(
        &mut self,
        latencies: impl IntoIterator<Item = (&'a str, f64)>,
        failures: usize,
    ) {
        self.cycles += 1;
        if failures == 0 {
            self.complete_cycles += 1;
        }
        self.encode_failures += failures as u64;

        for (channel, latency) in latencies {
            if latency < 0.0 {
                self.clock_skew += 1;
            }
            self.latency_stats
                .entry(channel.to_string())
                .or_default()
                .push(latency);
        }
    }

    /// 生成摘要报告
    pub fn summary(&self) -> BridgeSummary {
        BridgeSummary {
            cycles: self.cycles,
            complete_cycles: self.complete_cycles,
            encode_failures: self.encode_failures,
            clock_skew: self.clock_skew,
            complete_rate: if self.cycles > 0 {
                self.complete_cycles as f64 / self.cycles as f64 * 100.0
            } else {
                0.0
            },
            latency_ms: self
                .latency_stats
                .iter()
                .map(|(k, v)| (k.clone(), StatsSummary::from(v)))
                .collect(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct BridgeSummary {
    pub cycles: u64,
    pub complete_cycles: u64,
    pub encode_failures: u64,
    pub clock_skew: u64,
    pub complete_rate: f64,
    pub latency_ms: BTreeMap<String, StatsSummary>,
}

impl std::fmt::Display for BridgeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Frame Processing Summary ===")?;
        writeln!(
            f,
            "Cycles: {} (complete: {}, {:.2}%)",
            self.cycles, self.complete_cycles, self.complete_rate
        )?;
        writeln!(f, "Encode failures: {}", self.encode_failures)?;
        writeln!(f, "Clock skew anomalies: {}", self.clock_skew)?;

        if !self.latency_ms.is_empty() {
            writeln!(f, "Latency (ms):")?;
            for (channel, stats) in &self.latency_ms {
                writeln!(f, "  {}: {}", channel, stats)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();

        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_cycles() {
        let mut aggregator = BridgeMetricsAggregator::new();

        aggregator.record_cycle([("mobile_rgb", 5.0), ("hand_rgb", 7.0)], 0);
        aggregator.record_cycle([("mobile_rgb", 3.0)], 1);
        aggregator.record_cycle([("mobile_rgb", -1.0)], 0);

        let summary = aggregator.summary();
        assert_eq!(summary.cycles, 3);
        assert_eq!(summary.complete_cycles, 2);
        assert_eq!(summary.encode_failures, 1);
        assert_eq!(summary.clock_skew, 1);
        assert_eq!(summary.latency_ms["mobile_rgb"].count, 3);
        assert!((summary.latency_ms["hand_rgb"].mean - 7.0).abs() < 1e-10);
        assert!((summary.complete_rate - 66.666).abs() < 0.01);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = BridgeMetricsAggregator::new();
        aggregator.record_cycle([("map", 4.0)], 0);
        let text = aggregator.summary().to_string();
        assert!(text.contains("Cycles: 1"));
        assert!(text.contains("map: min=4.000"));

        aggregator.reset();
        assert_eq!(aggregator.summary().cycles, 0);
    }

    #[test]
    fn test_record_helpers_without_recorder() {
        // No global recorder installed: helpers must be no-ops.
        record_frame_latency_ms("map", 1.0);
        record_frame_age_ms("map", 40.0);
        record_processing_cycle(2, 1);
        record_snapshots_skipped("image", 0);
        set_subscribers("data", 3);
    }
}
