//! Attacher error types

use contracts::ContractError;
use thiserror::Error;

/// Why a channel could not be bound to its shared region.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AttachmentError {
    /// Producer has not created the region yet
    #[error("region '{region}' not found")]
    NotFound { region: String },

    /// Region exists but its size disagrees with the channel layout
    #[error("region '{region}' size mismatch: expected {expected} bytes, found {actual}")]
    SizeMismatch {
        region: String,
        expected: usize,
        actual: i64,
    },

    /// Channel is configured but not currently attached
    #[error("channel '{channel_id}' is not attached")]
    NotAttached { channel_id: String },

    /// OS call failed
    #[error("{op} failed for region '{region}': {message}")]
    Os {
        op: &'static str,
        region: String,
        message: String,
    },

    /// Feature compiled out
    #[error("shared memory support is not available: {0}")]
    Unsupported(String),
}

impl AttachmentError {
    pub fn not_found(region: impl Into<String>) -> Self {
        Self::NotFound {
            region: region.into(),
        }
    }

    pub fn not_attached(channel_id: impl Into<String>) -> Self {
        Self::NotAttached {
            channel_id: channel_id.into(),
        }
    }

    /// Create OS error
    pub fn os(op: &'static str, region: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Os {
            op,
            region: region.into(),
            message: message.into(),
        }
    }

    /// Short machine-readable reason (metrics label)
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::SizeMismatch { .. } => "size_mismatch",
            Self::NotAttached { .. } => "not_attached",
            Self::Os { .. } => "os_error",
            Self::Unsupported(_) => "unsupported",
        }
    }
}

impl From<AttachmentError> for ContractError {
    fn from(e: AttachmentError) -> Self {
        ContractError::Other(e.to_string())
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, AttachmentError>;
