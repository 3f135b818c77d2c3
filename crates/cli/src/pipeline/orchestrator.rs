//! Pipeline orchestrator - coordinates all components.
//!
//! Wires the producer link, shared-memory attacher, frame processor and
//! broadcast hub together behind the WebSocket server, then tears them
//! down in reverse order on shutdown or timeout.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::Result;
use attacher::{InMemoryRegions, RegionOpener, SharedBufferAttacher};
use broadcast::{BroadcastHub, CommandRelay, HubSources, SettingsChannel};
use contracts::{BridgeBlueprint, ChannelRegistry, ProducerMessage, ProducerMode};
use ingestion::{FrameProcessor, SignalWaiter};
use observability::BridgeMetricsAggregator;
use producer_link::{
    mock_link, EventTargets, ProducerHandle, ProducerWorker, SimulatedProducer, UdpProducerClient,
    WorkerStats,
};
use snapshot_store::{BridgeStateCell, FrameStore, TelemetryMirror};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::PipelineStats;
use crate::error::CliError;
use crate::server::{self, AppState};

/// Upper bound on waiting for each background task during shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The bridge blueprint configuration
    pub blueprint: BridgeBlueprint,

    /// Run timeout (None = until shutdown)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

/// Producer side of a run: the worker plus, in mock mode, the simulator.
struct ProducerTasks {
    worker: JoinHandle<WorkerStats>,
    simulator: Option<JoinHandle<()>>,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until `shutdown` resolves, the timeout elapses or the server fails.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let registry = blueprint.to_registry().map_err(CliError::from)?;
        let cancel = CancellationToken::new();

        // Shared stores
        let frames = Arc::new(FrameStore::new(&registry));
        let telemetry = Arc::new(TelemetryMirror::new(&blueprint.telemetry.to_schema()));
        let bridge_state = Arc::new(BridgeStateCell::default());
        let waiter = Arc::new(SignalWaiter::new(blueprint.processing.ready_tag.as_str()));

        // Producer link
        let (producer, outbound) = ProducerHandle::channel(blueprint.producer.outbound_capacity);
        let targets = EventTargets {
            waiter: Arc::clone(&waiter),
            telemetry: Arc::clone(&telemetry),
            bridge_state: Arc::clone(&bridge_state),
        };
        let (opener, producer_tasks) = self
            .start_producer(&registry, targets, outbound, &cancel)
            .await?;

        // Shared-memory attachment
        let attacher = Arc::new(SharedBufferAttacher::new(registry.clone(), opener));
        let initial = attacher.attach_all();
        let retry = if initial.is_complete() {
            info!(attached = initial.attached, "all shared regions attached");
            None
        } else {
            warn!(
                attached = initial.attached,
                total = initial.total,
                "shared regions missing, retrying in background"
            );
            Some(tokio::spawn(Arc::clone(&attacher).run_retry_loop(
                blueprint.processing.attach_retry(),
                cancel.clone(),
            )))
        };

        // Frame processing
        let aggregator = Arc::new(Mutex::new(BridgeMetricsAggregator::new()));
        let processor = FrameProcessor::new(
            &blueprint.processing,
            Arc::clone(&attacher),
            Arc::clone(&frames),
            Arc::clone(&waiter),
        )
        .with_aggregator(Arc::clone(&aggregator))
        .spawn()
        .map_err(CliError::ProcessorSpawn)?;

        // Broadcast
        let hub = BroadcastHub::new(
            HubSources {
                frames,
                telemetry: Arc::clone(&telemetry),
                bridge_state,
            },
            blueprint.cadence.clone(),
            cancel.clone(),
        );
        let tickers = hub.spawn_tickers();

        // Server
        let addr = format!("{}:{}", blueprint.server.host, blueprint.server.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| CliError::server_bind(&addr, e))?;
        let listen_addr = listener
            .local_addr()
            .map_err(|e| CliError::server_bind(&addr, e))?;
        info!(addr = %listen_addr, "WebSocket server listening");

        let state = AppState {
            hub: Arc::clone(&hub),
            relay: CommandRelay::new(producer.clone(), telemetry),
            settings: Arc::new(SettingsChannel::new(producer)),
            cancel: cancel.clone(),
        };
        let server = spawn_server(listener, state, cancel.clone());

        // Wait for a stop condition
        let timeout = async {
            match self.config.timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            _ = shutdown => info!("Shutdown requested"),
            _ = timeout => info!(timeout = ?self.config.timeout, "Timeout reached"),
            _ = cancel.cancelled() => warn!("Bridge stopped unexpectedly"),
        }

        // Teardown
        let subscribers = hub.len();
        cancel.cancel();
        hub.shutdown();

        await_task("server", server).await;
        for ticker in tickers {
            await_task("ticker", ticker).await;
        }

        let processor_snapshot = match tokio::task::spawn_blocking(move || processor.shutdown()).await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(error = %e, "frame processor shutdown failed");
                Default::default()
            }
        };

        let worker = await_task("producer worker", producer_tasks.worker)
            .await
            .unwrap_or_default();
        if let Some(simulator) = producer_tasks.simulator {
            await_task("simulated producer", simulator).await;
        }

        let attach = match retry {
            Some(task) => await_task("attach retry", task)
                .await
                .unwrap_or(initial),
            None => initial,
        };
        attacher.detach_all();

        let summary = aggregator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .summary();

        Ok(PipelineStats {
            duration: start_time.elapsed(),
            listen_addr: Some(listen_addr),
            channels: registry.len(),
            attach,
            processor: processor_snapshot,
            signals: waiter.stats(),
            worker,
            subscribers_at_exit: subscribers,
            summary,
        })
    }

    /// Start the producer link for the configured mode.
    ///
    /// Returns the region opener the attacher should use.
    async fn start_producer(
        &self,
        registry: &ChannelRegistry,
        targets: EventTargets,
        outbound: mpsc::Receiver<ProducerMessage>,
        cancel: &CancellationToken,
    ) -> Result<(Arc<dyn RegionOpener>, ProducerTasks)> {
        let config = &self.config.blueprint.producer;

        match config.mode {
            ProducerMode::Udp => {
                info!(
                    listen = %config.listen_addr,
                    remote = %config.remote_addr,
                    "Binding producer link"
                );
                let client = UdpProducerClient::bind(&config.listen_addr, &config.remote_addr)
                    .await
                    .map_err(|e| {
                        CliError::producer_bind(&config.listen_addr, &config.remote_addr, e.to_string())
                    })?;
                let worker =
                    tokio::spawn(ProducerWorker::new(client, targets, outbound).run(cancel.clone()));
                Ok((
                    attacher::system_opener(),
                    ProducerTasks {
                        worker,
                        simulator: None,
                    },
                ))
            }
            ProducerMode::Mock => {
                info!("Running in MOCK mode (no simulator required)");
                let regions = InMemoryRegions::new();
                let (client, remote) = mock_link();
                let simulated = SimulatedProducer::new(
                    registry.clone(),
                    regions.clone(),
                    remote,
                    config,
                    self.config.blueprint.processing.ready_tag.as_str(),
                );
                // regions exist before the first attach attempt
                simulated.create_regions();

                let worker =
                    tokio::spawn(ProducerWorker::new(client, targets, outbound).run(cancel.clone()));
                let simulator = tokio::spawn(simulated.run(cancel.clone()));
                Ok((
                    Arc::new(regions),
                    ProducerTasks {
                        worker,
                        simulator: Some(simulator),
                    },
                ))
            }
        }
    }
}

fn spawn_server(listener: TcpListener, state: AppState, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = server::serve(listener, state, cancel.clone()).await {
            error!(error = %e, "WebSocket server failed");
            cancel.cancel();
        }
    })
}

/// Join a background task, giving up after [`SHUTDOWN_GRACE`].
async fn await_task<T>(name: &'static str, task: JoinHandle<T>) -> Option<T> {
    match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            error!(task = name, error = %e, "task failed");
            None
        }
        Err(_) => {
            warn!(task = name, "task did not stop in time");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ChannelDescriptor;

    fn mock_blueprint() -> BridgeBlueprint {
        let mut blueprint = BridgeBlueprint::default();
        blueprint.server.host = "127.0.0.1".into();
        blueprint.server.port = 0;
        blueprint.producer.mode = ProducerMode::Mock;
        blueprint.producer.mock_signal_hz = 50.0;
        blueprint.channels = vec![
            ChannelDescriptor::color("mobile_rgb", 24, 32),
            ChannelDescriptor::color("hand_rgb", 24, 32),
        ];
        blueprint
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn mock_run_processes_frames_until_timeout() {
        let pipeline = Pipeline::new(PipelineConfig {
            blueprint: mock_blueprint(),
            timeout: Some(Duration::from_millis(600)),
            metrics_port: None,
        });

        let stats = pipeline.run(std::future::pending()).await.unwrap();
        assert_eq!(stats.channels, 2);
        assert!(stats.attach.is_complete(), "{:?}", stats.attach);
        assert!(stats.processor.cycles > 0, "{:?}", stats.processor);
        assert!(stats.processor.frames_published > 0);
        assert!(stats.worker.events > 0);
        assert!(stats.listen_addr.is_some());
        assert_eq!(stats.subscribers_at_exit, 0);
    }

    #[tokio::test]
    async fn shutdown_future_stops_the_run() {
        let pipeline = Pipeline::new(PipelineConfig {
            blueprint: mock_blueprint(),
            timeout: None,
            metrics_port: None,
        });

        let stats = pipeline
            .run(tokio::time::sleep(Duration::from_millis(100)))
            .await
            .unwrap();
        assert!(stats.duration >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn udp_bind_failure_is_reported() {
        let mut blueprint = mock_blueprint();
        blueprint.producer.mode = ProducerMode::Udp;
        blueprint.producer.remote_addr = "not-an-address".into();

        let err = Pipeline::new(PipelineConfig {
            blueprint,
            timeout: Some(Duration::from_millis(10)),
            metrics_port: None,
        })
        .run(std::future::pending())
        .await
        .unwrap_err();
        assert!(err.to_string().contains("producer link"), "{err}");
    }
}
