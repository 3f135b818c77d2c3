//! Pipeline statistics and metrics.

use std::net::SocketAddr;
use std::time::Duration;

use attacher::AttachReport;
use ingestion::{ProcessorMetricsSnapshot, SignalStats};
use observability::BridgeSummary;
use producer_link::WorkerStats;

/// Statistics from a bridge run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Total duration of the run
    pub duration: Duration,

    /// Address the WebSocket server was bound to
    pub listen_addr: Option<SocketAddr>,

    /// Configured channel count
    pub channels: usize,

    /// Last attach result
    pub attach: AttachReport,

    /// Frame processor counters
    pub processor: ProcessorMetricsSnapshot,

    /// Ready-signal counters
    pub signals: SignalStats,

    /// Producer link counters
    pub worker: WorkerStats,

    /// Subscribers still connected when shutdown began
    pub subscribers_at_exit: usize,

    /// Latency and completeness summary
    pub summary: BridgeSummary,
}

impl PipelineStats {
    /// Processing cycles per second
    pub fn cycles_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.processor.cycles as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                     Bridge Statistics                        ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        if let Some(addr) = self.listen_addr {
            println!("   ├─ Listen: {}", addr);
        }
        println!(
            "   ├─ Channels attached: {}/{}",
            self.attach.attached, self.channels
        );
        println!("   ├─ Cycles/s: {:.2}", self.cycles_per_sec());
        println!("   └─ Subscribers at exit: {}", self.subscribers_at_exit);

        println!("\n🖼  Frame Processing");
        println!(
            "   ├─ Cycles: {} (complete: {})",
            self.processor.cycles, self.processor.complete_cycles
        );
        println!("   ├─ Frames published: {}", self.processor.frames_published);
        println!("   ├─ Channel failures: {}", self.processor.channel_failures);
        println!("   ├─ Clock skew: {}", self.processor.clock_skew);
        println!("   └─ Idle waits: {}", self.processor.idle_waits);

        println!("\n📡 Producer Link");
        println!(
            "   ├─ Signals: {} accepted, {} ignored, {} coalesced",
            self.signals.accepted, self.signals.ignored, self.signals.coalesced
        );
        println!(
            "   ├─ Events: {} ({} rejected)",
            self.worker.events, self.worker.rejected_events
        );
        println!(
            "   └─ Messages sent: {} ({} failed)",
            self.worker.messages_sent, self.worker.send_failures
        );

        if !self.attach.failures.is_empty() {
            println!("\n⚠️  Unattached Channels");
            for (channel, error) in &self.attach.failures {
                println!("   ├─ {}: {}", channel, error);
            }
        }

        println!("\n{}", self.summary);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycles_per_sec() {
        let stats = PipelineStats {
            duration: Duration::from_secs(2),
            processor: ProcessorMetricsSnapshot {
                cycles: 50,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(stats.cycles_per_sec(), 25.0);
        assert_eq!(PipelineStats::default().cycles_per_sec(), 0.0);
    }
}
