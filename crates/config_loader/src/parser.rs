//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。

use contracts::{BridgeBlueprint, ContractError};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析 TOML 格式配置
pub fn parse_toml(content: &str) -> Result<BridgeBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<BridgeBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<BridgeBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ChannelKind, ElementLayout, ProducerMode};

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
[[channels]]
id = "mobile_rgb"
region = "shm_mobile_rgb"
shape = [480, 640, 3]
"#;
        let result = parse_toml(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.channels.len(), 1);
        assert_eq!(bp.channels[0].element, ElementLayout::U8);
        assert_eq!(bp.server.port, 8000);
        assert_eq!(bp.producer.mode, ProducerMode::Udp);
        assert_eq!(bp.cadence.image_hz, 25.0);
    }

    #[test]
    fn test_parse_toml_depth_channel() {
        let content = r#"
[producer]
mode = "mock"

[[channels]]
id = "hand_depth"
region = "shm_hand_depth"
shape = [480, 640]
element = "f32"
kind = "depth"
depth_range = { min = 0.1, max = 1.0 }
"#;
        let bp = parse_toml(content).unwrap();
        assert_eq!(bp.producer.mode, ProducerMode::Mock);
        let depth = &bp.channels[0];
        assert_eq!(depth.kind, ChannelKind::Depth);
        assert_eq!(depth.element, ElementLayout::F32);
        assert_eq!(depth.depth_range.map(|r| r.max), Some(1.0));
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "server": { "port": 9000 },
            "channels": [
                { "id": "map", "region": "shm_map", "shape": [480, 640, 3] }
            ],
            "cadence": { "bridge_hz": 50 }
        }"#;
        let result = parse_json(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.server.port, 9000);
        assert_eq!(bp.server.host, "0.0.0.0");
        assert_eq!(bp.cadence.bridge_hz, 50.0);
        assert_eq!(bp.cadence.data_hz, 20.0);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let content = "invalid toml [[[";
        let result = parse_toml(content);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_parse_missing_channels() {
        let result = parse_toml("[server]\nport = 8000\n");
        assert!(matches!(result, Err(ContractError::ConfigParse { .. })));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("TOML"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("json"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
