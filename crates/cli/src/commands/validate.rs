//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{BridgeBlueprint, ChannelKind, ProducerMode};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    listen: String,
    producer_mode: String,
    channel_count: usize,
    region_bytes: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    listen: format!("{}:{}", blueprint.server.host, blueprint.server.port),
                    producer_mode: format!("{:?}", blueprint.producer.mode),
                    channel_count: blueprint.channels.len(),
                    region_bytes: blueprint.total_region_bytes(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &BridgeBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.producer.mode == ProducerMode::Mock {
        warnings.push("producer.mode = mock - frames and telemetry are simulated".to_string());
        if blueprint.cadence.image_hz > blueprint.producer.mock_signal_hz {
            warnings.push(format!(
                "cadence.image_hz ({}) exceeds producer.mock_signal_hz ({}) - image pushes will repeat frames",
                blueprint.cadence.image_hz, blueprint.producer.mock_signal_hz
            ));
        }
    }

    for channel in &blueprint.channels {
        if channel.kind == ChannelKind::Depth && channel.depth_range.is_none() {
            let range = channel.effective_depth_range();
            warnings.push(format!(
                "Depth channel '{}' has no depth_range - using {}..{} m",
                channel.id, range.min, range.max
            ));
        }
    }

    if blueprint.processing.jpeg_quality > 90 {
        warnings.push(format!(
            "processing.jpeg_quality = {} - image messages will be large",
            blueprint.processing.jpeg_quality
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Listen: {}", summary.listen);
            println!("  Producer: {}", summary.producer_mode);
            println!("  Channels: {}", summary.channel_count);
            println!("  Region bytes: {}", summary.region_bytes);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
