//! 配置校验模块
//!
//! 校验规则：
//! - 至少一个通道，channel id 仅含 `[A-Za-z0-9_-]`，region 非空，二者唯一
//! - shape 非空且各维度 > 0
//! - color 通道必须为 u8 且分量数为 1/3/4，depth 通道必须为单分量 f32
//! - depth_range.min < depth_range.max
//! - JPEG 质量 1..=100
//! - 推送频率 0 < hz <= 1000，超时/间隔 > 0
//! - udp 模式下地址可解析

use std::collections::HashSet;
use std::net::SocketAddr;

use contracts::{
    BridgeBlueprint, ChannelDescriptor, ChannelId, ChannelKind, ContractError, ElementLayout, ProducerMode,
    SubscriberRole,
};

const MAX_CADENCE_HZ: f64 = 1000.0;

/// 校验 BridgeBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &BridgeBlueprint) -> Result<(), ContractError> {
    validate_channel_ids(blueprint)?;
    for (idx, channel) in blueprint.channels.iter().enumerate() {
        validate_channel_layout(idx, channel)?;
    }
    validate_processing(blueprint)?;
    validate_cadence(blueprint)?;
    validate_producer(blueprint)?;
    Ok(())
}

/// 校验 channel id / region 唯一性
fn validate_channel_ids(blueprint: &BridgeBlueprint) -> Result<(), ContractError> {
    if blueprint.channels.is_empty() {
        return Err(ContractError::config_validation(
            "channels",
            "at least one channel must be configured",
        ));
    }

    let mut ids = HashSet::new();
    let mut regions = HashSet::new();
    for (idx, channel) in blueprint.channels.iter().enumerate() {
        if let Err(reason) = ChannelId::check_name(&channel.id) {
            return Err(ContractError::config_validation(
                format!("channels[{idx}].id"),
                reason,
            ));
        }
        if channel.region.is_empty() {
            return Err(ContractError::config_validation(
                format!("channels[{}].region", channel.id),
                "region name cannot be empty",
            ));
        }
        if !ids.insert(channel.id.as_str()) {
            return Err(ContractError::config_validation(
                format!("channels[id={}]", channel.id),
                "duplicate channel id",
            ));
        }
        if !regions.insert(channel.region.as_str()) {
            return Err(ContractError::config_validation(
                format!("channels[{}].region", channel.id),
                format!("duplicate region '{}'", channel.region),
            ));
        }
    }
    Ok(())
}

/// 校验单个通道的形状与元素布局
fn validate_channel_layout(idx: usize, channel: &ChannelDescriptor) -> Result<(), ContractError> {
    let field = |name: &str| format!("channels[{idx}:{}].{name}", channel.id);

    if !(2..=3).contains(&channel.shape.len()) {
        return Err(ContractError::config_validation(
            field("shape"),
            format!(
                "shape must be [height, width] or [height, width, components], got {:?}",
                channel.shape
            ),
        ));
    }
    if channel.shape.contains(&0) {
        return Err(ContractError::config_validation(
            field("shape"),
            format!("all dimensions must be > 0, got {:?}", channel.shape),
        ));
    }

    match channel.kind {
        ChannelKind::Color => {
            if channel.element != ElementLayout::U8 {
                return Err(ContractError::config_validation(
                    field("element"),
                    "color channels must use u8 elements",
                ));
            }
            if !matches!(channel.components(), 1 | 3 | 4) {
                return Err(ContractError::config_validation(
                    field("shape"),
                    format!(
                        "color channels need 1, 3 or 4 components, got {}",
                        channel.components()
                    ),
                ));
            }
        }
        ChannelKind::Depth => {
            if channel.element != ElementLayout::F32 {
                return Err(ContractError::config_validation(
                    field("element"),
                    "depth channels must use f32 elements",
                ));
            }
            if channel.components() != 1 {
                return Err(ContractError::config_validation(
                    field("shape"),
                    "depth channels must be single-component",
                ));
            }
        }
    }

    if let Some(range) = channel.depth_range {
        if !(range.min < range.max) {
            return Err(ContractError::config_validation(
                field("depth_range"),
                format!("min ({}) must be < max ({})", range.min, range.max),
            ));
        }
    }
    Ok(())
}

/// 校验处理参数
fn validate_processing(blueprint: &BridgeBlueprint) -> Result<(), ContractError> {
    let processing = &blueprint.processing;

    for (name, quality) in [
        ("processing.jpeg_quality", processing.jpeg_quality),
        ("processing.depth_quality", processing.depth_quality),
    ] {
        if !(1..=100).contains(&quality) {
            return Err(ContractError::config_validation(
                name,
                format!("quality must be in 1..=100, got {quality}"),
            ));
        }
    }

    if processing.ready_tag.is_empty() {
        return Err(ContractError::config_validation(
            "processing.ready_tag",
            "ready tag cannot be empty",
        ));
    }

    for (name, value) in [
        ("processing.signal_timeout_ms", processing.signal_timeout_ms),
        ("processing.attach_retry_ms", processing.attach_retry_ms),
        (
            "processing.latency_log_interval_ms",
            processing.latency_log_interval_ms,
        ),
    ] {
        if value == 0 {
            return Err(ContractError::config_validation(name, "must be > 0"));
        }
    }

    if processing.latency_history == 0 {
        return Err(ContractError::config_validation(
            "processing.latency_history",
            "must be > 0",
        ));
    }
    Ok(())
}

/// 校验推送频率
fn validate_cadence(blueprint: &BridgeBlueprint) -> Result<(), ContractError> {
    for role in SubscriberRole::ALL {
        let hz = blueprint.cadence.hz(role);
        if !(hz > 0.0 && hz <= MAX_CADENCE_HZ) {
            return Err(ContractError::config_validation(
                format!("cadence.{}_hz", role.as_str()),
                format!("must be in (0, {MAX_CADENCE_HZ}], got {hz}"),
            ));
        }
    }
    Ok(())
}

/// 校验生产者链路配置
fn validate_producer(blueprint: &BridgeBlueprint) -> Result<(), ContractError> {
    let producer = &blueprint.producer;

    if producer.outbound_capacity == 0 {
        return Err(ContractError::config_validation(
            "producer.outbound_capacity",
            "must be > 0",
        ));
    }

    match producer.mode {
        ProducerMode::Udp => {
            for (name, addr) in [
                ("producer.listen_addr", &producer.listen_addr),
                ("producer.remote_addr", &producer.remote_addr),
            ] {
                addr.parse::<SocketAddr>().map_err(|e| {
                    ContractError::config_validation(name, format!("invalid address '{addr}': {e}"))
                })?;
            }
        }
        ProducerMode::Mock => {
            for (name, hz) in [
                ("producer.mock_signal_hz", producer.mock_signal_hz),
                ("producer.mock_gui_hz", producer.mock_gui_hz),
            ] {
                if !(hz > 0.0 && hz <= MAX_CADENCE_HZ) {
                    return Err(ContractError::config_validation(
                        name,
                        format!("must be in (0, {MAX_CADENCE_HZ}], got {hz}"),
                    ));
                }
            }
        }
    }
    Ok(())
}
