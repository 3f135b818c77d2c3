//! Broadcast error types

use contracts::ContractError;
use thiserror::Error;

/// Broadcast result type
pub type Result<T> = std::result::Result<T, BroadcastError>;

/// Broadcast, relay and settings errors
#[derive(Debug, Error)]
pub enum BroadcastError {
    /// Snapshot could not be serialized
    #[error("failed to serialize {role} snapshot: {source}")]
    Serialize {
        role: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Inbound text is not JSON
    #[error("payload is not JSON: {0}")]
    NotJson(#[source] serde_json::Error),

    /// JSON that does not describe a command
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Subscriber connection failed
    #[error(transparent)]
    Connection(#[from] ContractError),

    /// Producer queue rejected the message
    #[error("producer queue rejected {topic}")]
    ProducerUnavailable { topic: &'static str },

    /// Hub is shutting down
    #[error("broadcast hub is shut down")]
    Shutdown,
}

impl BroadcastError {
    pub fn invalid_command(message: impl Into<String>) -> Self {
        Self::InvalidCommand(message.into())
    }

    /// Short label for metrics and logs
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Serialize { .. } => "serialize",
            Self::NotJson(_) => "not_json",
            Self::InvalidCommand(_) => "invalid_command",
            Self::Connection(_) => "connection",
            Self::ProducerUnavailable { .. } => "producer_unavailable",
            Self::Shutdown => "shutdown",
        }
    }
}
