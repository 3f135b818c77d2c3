//! Simulated producer for mock mode
//!
//! Creates in-memory regions for every channel, paints a moving test
//! pattern into them and emits ready signals and GUI telemetry on fixed
//! cadences. Operator commands are echoed back as robot state so every
//! subscriber role has live data without a simulator.

use std::time::Duration;

use attacher::InMemoryRegions;
use contracts::{
    ChannelDescriptor, ChannelKind, ChannelRegistry, ControlValue, GuiValue, ProducerConfig,
    ProducerEvent, ReadySignal,
};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::mock::MockProducerRemote;

pub struct SimulatedProducer {
    registry: ChannelRegistry,
    regions: InMemoryRegions,
    remote: MockProducerRemote,
    ready_tag: String,
    signal_period: Duration,
    gui_period: Duration,
    frame: u64,
}

impl SimulatedProducer {
    pub fn new(
        registry: ChannelRegistry,
        regions: InMemoryRegions,
        remote: MockProducerRemote,
        config: &ProducerConfig,
        ready_tag: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            regions,
            remote,
            ready_tag: ready_tag.into(),
            signal_period: period(config.mock_signal_hz),
            gui_period: period(config.mock_gui_hz),
            frame: 0,
        }
    }

    /// Create a correctly sized region for every channel that has none yet.
    pub fn create_regions(&self) {
        for descriptor in self.registry.iter() {
            if self.regions.get(&descriptor.region).is_none() {
                self.regions.create(&descriptor.region, descriptor.byte_size());
            }
        }
    }

    /// Paint the next frame and emit its ready signal.
    pub fn emit_frame(&mut self, capture_timestamp_ns: i64) -> bool {
        self.frame += 1;
        for descriptor in self.registry.iter() {
            if let Some(region) = self.regions.get(&descriptor.region) {
                region.with_mut(|buf| paint(descriptor, self.frame, buf));
            }
        }
        self.remote.emit(ProducerEvent::ImageSignal(ReadySignal::new(
            capture_timestamp_ns,
            self.ready_tag.as_str(),
        )))
    }

    /// Emit GUI telemetry and echo the latest operator command.
    pub fn emit_telemetry(&mut self) -> bool {
        let t = self.frame as f64 * self.signal_period.as_secs_f64();
        let gui = GuiValue {
            battery: (100.0 - t / 60.0).max(0.0),
            linear_accel: 0.5 * (t * 0.5).sin(),
            steer: 0.3 * (t * 0.25).cos(),
            gripper_opening: 75.0 + 75.0 * (t * 0.2).sin(),
            joint_angles: (0..6).map(|j| 90.0 + 30.0 * (t + j as f64).sin()).collect(),
            cartesian_position: (0..6).map(|j| 0.1 * (t * 0.3 + j as f64).cos()).collect(),
            force_torque: (0..6).map(|j| (t * 2.0 + j as f64).sin()).collect(),
        };
        if !self.remote.emit(ProducerEvent::RobotToGui(gui)) {
            return false;
        }

        match self.remote.take_latest_command() {
            Some(command) => self.remote.emit(ProducerEvent::SlaveInfo(ControlValue {
                stamp: t,
                ..command
            })),
            None => true,
        }
    }

    /// Run until cancelled or the bridge side hangs up.
    #[instrument(name = "simulated_producer", skip_all, fields(channels = self.registry.len()))]
    pub async fn run(mut self, cancel: CancellationToken) {
        self.create_regions();
        info!(
            signal_hz = 1.0 / self.signal_period.as_secs_f64(),
            gui_hz = 1.0 / self.gui_period.as_secs_f64(),
            "simulated producer started"
        );

        let mut signal_tick = tokio::time::interval(self.signal_period);
        signal_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut gui_tick = tokio::time::interval(self.gui_period);
        gui_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let alive = tokio::select! {
                _ = cancel.cancelled() => break,
                _ = signal_tick.tick() => self.emit_frame(ingestion::system_clock_ns()),
                _ = gui_tick.tick() => self.emit_telemetry(),
            };
            if !alive {
                debug!("bridge side closed");
                break;
            }
        }
        info!(frames = self.frame, "simulated producer stopped");
    }
}

fn period(hz: f64) -> Duration {
    if hz > 0.0 {
        Duration::from_secs_f64(1.0 / hz)
    } else {
        Duration::from_secs(1)
    }
}

/// Diagonal color bands that move one step per frame; depth is a
/// horizontal ramp across the channel's range.
fn paint(descriptor: &ChannelDescriptor, frame: u64, buf: &mut [u8]) {
    let width = descriptor.width().max(1);
    match descriptor.kind {
        ChannelKind::Color => {
            let components = descriptor.components();
            for (i, px) in buf.chunks_exact_mut(components).enumerate() {
                let (y, x) = (i / width, i % width);
                for (c, v) in px.iter_mut().enumerate() {
                    *v = ((x + y) as u64 + frame * 4 + c as u64 * 85) as u8;
                }
            }
        }
        ChannelKind::Depth => {
            let range = descriptor.effective_depth_range();
            for (i, px) in buf.chunks_exact_mut(4).enumerate() {
                let x = (i % width) as u64;
                let fraction = ((x + frame) % width as u64) as f32 / width as f32;
                let depth = range.min + (range.max - range.min) * fraction;
                px.copy_from_slice(&depth.to_ne_bytes());
            }
        }
    }
}
