//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::{BridgeBlueprint, ProducerMode};
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_bridge(args: &RunArgs) -> Result<()> {
    let blueprint = load_blueprint(args)?;

    info!(
        host = %blueprint.server.host,
        port = blueprint.server.port,
        mode = ?blueprint.producer.mode,
        channels = blueprint.channels.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let metrics_port = match blueprint.server.metrics_port {
        0 => None,
        port => Some(port),
    };
    let pipeline_config = PipelineConfig {
        blueprint,
        timeout: if args.timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(args.timeout))
        },
        metrics_port,
    };

    info!("Starting bridge...");
    let stats = Pipeline::new(pipeline_config)
        .run(shutdown_signal())
        .await
        .context("Bridge execution failed")?;

    info!(
        cycles = stats.processor.cycles,
        frames_published = stats.processor.frames_published,
        duration_secs = stats.duration.as_secs_f64(),
        fps = format!("{:.2}", stats.cycles_per_sec()),
        "Bridge stopped"
    );
    stats.print_summary();

    Ok(())
}

/// Load the configuration (or defaults) and apply CLI overrides.
fn load_blueprint(args: &RunArgs) -> Result<BridgeBlueprint> {
    let mut blueprint = match &args.config {
        Some(path) => {
            info!(config = %path.display(), "Loading configuration");
            if !path.exists() {
                return Err(CliError::config_not_found(path.display().to_string()).into());
            }
            config_loader::ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => {
            info!("No configuration file given, using built-in defaults");
            BridgeBlueprint::default()
        }
    };

    if let Some(ref host) = args.host {
        info!(host = %host, "Overriding listen host from CLI");
        blueprint.server.host = host.clone();
    }
    if let Some(port) = args.port {
        info!(port = port, "Overriding listen port from CLI");
        blueprint.server.port = port;
    }
    if let Some(port) = args.metrics_port {
        blueprint.server.metrics_port = port;
    }
    if args.mock {
        info!("Mock producer requested from CLI");
        blueprint.producer.mode = ProducerMode::Mock;
    }

    Ok(blueprint)
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    warn!("Received shutdown signal, stopping bridge...");
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &BridgeBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Server:");
    println!("  Listen: {}:{}", blueprint.server.host, blueprint.server.port);
    if blueprint.server.metrics_port != 0 {
        println!("  Metrics: {}", blueprint.server.metrics_port);
    }

    println!("\nProducer:");
    match blueprint.producer.mode {
        ProducerMode::Udp => println!(
            "  UDP: {} <- -> {}",
            blueprint.producer.listen_addr, blueprint.producer.remote_addr
        ),
        ProducerMode::Mock => println!(
            "  Simulated: {:.0} Hz frames, {:.0} Hz telemetry",
            blueprint.producer.mock_signal_hz, blueprint.producer.mock_gui_hz
        ),
    }

    println!("\nChannels ({}):", blueprint.channels.len());
    for channel in &blueprint.channels {
        println!(
            "  - {} ({}, {}x{}) <- {}",
            channel.id,
            channel.kind.as_str(),
            channel.width(),
            channel.height(),
            channel.region
        );
    }

    println!("\nCadence (Hz):");
    println!(
        "  data {} / image {} / control {} / bridge {}",
        blueprint.cadence.data_hz,
        blueprint.cadence.image_hz,
        blueprint.cadence.control_hz,
        blueprint.cadence.bridge_hz
    );
    println!();
}
