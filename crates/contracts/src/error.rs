//! Layered error definitions
//!
//! Categorized by source: config / channel / telemetry / connection

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Channel Errors =====
    /// Channel id not present in the registry
    #[error("unknown channel: {channel_id}")]
    UnknownChannel { channel_id: String },

    /// Channel id that cannot be used as a wire key or region suffix
    #[error("invalid channel id '{channel_id}': {reason}")]
    InvalidChannelId { channel_id: String, reason: String },

    /// Capture stamp outside the representable nanosecond range
    #[error("capture stamp out of range: sec={sec}, nanosec={nanosec}")]
    StampOutOfRange { sec: i64, nanosec: u32 },

    // ===== Telemetry Errors =====
    /// Field name not declared in the telemetry schema
    #[error("unknown telemetry field: {field}")]
    UnknownField { field: String },

    // ===== Connection Errors =====
    /// Peer closed the connection
    #[error("connection '{peer}' closed")]
    ConnectionClosed { peer: String },

    /// Send or receive failed on a live connection
    #[error("connection '{peer}' error: {message}")]
    Connection { peer: String, message: String },

    // ===== General Errors =====
    /// Serialization error
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn unknown_channel(channel_id: impl Into<String>) -> Self {
        Self::UnknownChannel {
            channel_id: channel_id.into(),
        }
    }

    pub fn invalid_channel_id(channel_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidChannelId {
            channel_id: channel_id.into(),
            reason: reason.into(),
        }
    }

    pub fn stamp_out_of_range(stamp: crate::Stamp) -> Self {
        Self::StampOutOfRange {
            sec: stamp.sec,
            nanosec: stamp.nanosec,
        }
    }

    pub fn unknown_field(field: impl Into<String>) -> Self {
        Self::UnknownField {
            field: field.into(),
        }
    }

    pub fn connection_closed(peer: impl Into<String>) -> Self {
        Self::ConnectionClosed { peer: peer.into() }
    }

    /// Create connection error
    pub fn connection(peer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            peer: peer.into(),
            message: message.into(),
        }
    }

    /// True when the peer went away (clean close or transport failure).
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed { .. } | Self::Connection { .. }
        )
    }
}
