//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{BridgeBlueprint, ProducerMode, SubscriberRole};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;
use crate::server::{role_path, HEALTH_PATH, SETTINGS_PATH};

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    server: ServerInfo,
    producer: ProducerInfo,
    channel_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    channels: Vec<ChannelInfo>,
    cadence_hz: Vec<(&'static str, f64)>,
    endpoints: Vec<String>,
}

#[derive(Serialize)]
struct ServerInfo {
    host: String,
    port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics_port: Option<u16>,
}

#[derive(Serialize)]
struct ProducerInfo {
    mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    listen_addr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote_addr: Option<String>,
    ready_tag: String,
}

#[derive(Serialize)]
struct ChannelInfo {
    id: String,
    region: String,
    kind: &'static str,
    element: &'static str,
    shape: Vec<usize>,
    byte_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    depth_range: Option<(f32, f32)>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn build_config_info(blueprint: &BridgeBlueprint, args: &InfoArgs) -> ConfigInfo {
    let udp = blueprint.producer.mode == ProducerMode::Udp;

    let channels = if args.channels {
        blueprint
            .channels
            .iter()
            .map(|c| ChannelInfo {
                id: c.id.to_string(),
                region: c.region.clone(),
                kind: c.kind.as_str(),
                element: c.element.as_str(),
                shape: c.shape.clone(),
                byte_size: c.byte_size(),
                depth_range: c.depth_range.map(|r| (r.min, r.max)),
            })
            .collect()
    } else {
        Vec::new()
    };

    let mut endpoints: Vec<String> = SubscriberRole::ALL
        .iter()
        .map(|role| role_path(*role).to_string())
        .collect();
    endpoints.push(SETTINGS_PATH.to_string());
    endpoints.push(HEALTH_PATH.to_string());

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        server: ServerInfo {
            host: blueprint.server.host.clone(),
            port: blueprint.server.port,
            metrics_port: (blueprint.server.metrics_port != 0)
                .then_some(blueprint.server.metrics_port),
        },
        producer: ProducerInfo {
            mode: format!("{:?}", blueprint.producer.mode),
            listen_addr: udp.then(|| blueprint.producer.listen_addr.clone()),
            remote_addr: udp.then(|| blueprint.producer.remote_addr.clone()),
            ready_tag: blueprint.processing.ready_tag.clone(),
        },
        channel_count: blueprint.channels.len(),
        channels,
        cadence_hz: SubscriberRole::ALL
            .iter()
            .map(|role| (role.as_str(), blueprint.cadence.hz(*role)))
            .collect(),
        endpoints,
    }
}

fn print_config_info(blueprint: &BridgeBlueprint, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Teleop Bridge Configuration                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("🌐 Server");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!(
        "   ├─ Listen: {}:{}",
        blueprint.server.host, blueprint.server.port
    );
    match blueprint.server.metrics_port {
        0 => println!("   └─ Metrics: disabled"),
        port => println!("   └─ Metrics: {}", port),
    }

    println!("\n🔌 Producer");
    match blueprint.producer.mode {
        ProducerMode::Udp => {
            println!("   ├─ Mode: UDP");
            println!("   ├─ Listen: {}", blueprint.producer.listen_addr);
            println!("   ├─ Remote: {}", blueprint.producer.remote_addr);
        }
        ProducerMode::Mock => {
            println!("   ├─ Mode: simulated");
            println!(
                "   ├─ Signals: {} Hz / telemetry {} Hz",
                blueprint.producer.mock_signal_hz, blueprint.producer.mock_gui_hz
            );
        }
    }
    println!("   └─ Ready tag: {}", blueprint.processing.ready_tag);

    println!("\n📷 Channels ({})", blueprint.channels.len());
    for (i, channel) in blueprint.channels.iter().enumerate() {
        let is_last = i == blueprint.channels.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!("   {} {} ({})", prefix, channel.id, channel.kind.as_str());
        if args.channels {
            println!("   {}  ├─ Region: {}", child_prefix, channel.region);
            println!(
                "   {}  ├─ Shape: {:?} {}",
                child_prefix,
                channel.shape,
                channel.element.as_str()
            );
            if let Some(range) = channel.depth_range {
                println!("   {}  ├─ Depth: {}..{} m", child_prefix, range.min, range.max);
            }
            println!("   {}  └─ Bytes: {}", child_prefix, channel.byte_size());
        }
    }

    println!("\n⏱  Cadence");
    for (i, role) in SubscriberRole::ALL.iter().enumerate() {
        let prefix = if i == SubscriberRole::ALL.len() - 1 {
            "└─"
        } else {
            "├─"
        };
        println!(
            "   {} {} {} Hz",
            prefix,
            role_path(*role),
            blueprint.cadence.hz(*role)
        );
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_info_lists_endpoints_and_channels() {
        let blueprint = BridgeBlueprint::default();
        let args = InfoArgs {
            config: "unused.toml".into(),
            json: true,
            channels: true,
        };

        let info = build_config_info(&blueprint, &args);
        assert_eq!(info.channel_count, 3);
        assert_eq!(info.channels.len(), 3);
        assert_eq!(info.channels[0].byte_size, 480 * 640 * 3);
        assert!(info.endpoints.contains(&"/ws/ros_teleop_bridge".to_string()));
        assert!(info.endpoints.contains(&"/ws/setting".to_string()));
        assert_eq!(info.producer.listen_addr.as_deref(), Some("0.0.0.0:9870"));

        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value["server"]["port"], 8000);
        assert!(value["server"].get("metrics_port").is_none());
    }

    #[test]
    fn channels_hidden_without_flag() {
        let args = InfoArgs {
            config: "unused.toml".into(),
            json: true,
            channels: false,
        };
        let info = build_config_info(&BridgeBlueprint::default(), &args);
        assert!(info.channels.is_empty());
        assert_eq!(info.cadence_hz.len(), 4);
    }
}
