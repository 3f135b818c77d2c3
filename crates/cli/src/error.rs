//! Error types for CLI operations.

use contracts::ContractError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Channel list rejected when building the registry
    #[error("Invalid channel configuration: {0}")]
    Channels(#[from] ContractError),

    /// Producer UDP socket could not be bound
    #[error("Failed to bind producer link {listen} -> {remote}: {message}")]
    ProducerBind {
        listen: String,
        remote: String,
        message: String,
    },

    /// Frame processor thread could not be started
    #[error("Failed to start frame processor: {0}")]
    ProcessorSpawn(#[source] std::io::Error),

    /// HTTP listener could not be bound
    #[error("Failed to bind server at {addr}: {source}")]
    ServerBind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn producer_bind(
        listen: impl Into<String>,
        remote: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ProducerBind {
            listen: listen.into(),
            remote: remote.into(),
            message: message.into(),
        }
    }

    pub fn server_bind(addr: impl Into<String>, source: std::io::Error) -> Self {
        Self::ServerBind {
            addr: addr.into(),
            source,
        }
    }
}
