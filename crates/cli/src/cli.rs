//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Teleop Bridge - shared-memory camera frames and robot telemetry over WebSocket
#[derive(Parser, Debug)]
#[command(
    name = "teleop-bridge",
    author,
    version,
    about = "Teleoperation bridge between a simulator and browser GUIs",
    long_about = "Attaches to the producer's shared-memory image regions, encodes frames \n\
                  on every ready signal, and pushes frames, telemetry and robot state \n\
                  to WebSocket subscribers while relaying operator commands back."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "TELEOP_BRIDGE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "TELEOP_BRIDGE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the bridge server
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); built-in defaults when absent
    #[arg(short, long, env = "TELEOP_BRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override listen host from configuration
    #[arg(long, env = "TELEOP_BRIDGE_HOST")]
    pub host: Option<String>,

    /// Override listen port from configuration
    #[arg(long, env = "TELEOP_BRIDGE_PORT")]
    pub port: Option<u16>,

    /// Prometheus metrics port (0 = disabled, overrides configuration)
    #[arg(long, env = "TELEOP_BRIDGE_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Use the built-in simulated producer instead of UDP + shared memory
    #[arg(long, env = "TELEOP_BRIDGE_MOCK")]
    pub mock: bool,

    /// Server timeout in seconds (0 = run until interrupted)
    #[arg(long, default_value = "0", env = "TELEOP_BRIDGE_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without starting the server
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config/bridge.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/bridge.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show per-channel region details
    #[arg(long)]
    pub channels: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
