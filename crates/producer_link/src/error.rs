//! Producer link error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProducerLinkError {
    /// Socket setup failed
    #[error("failed to bind producer link on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Address did not parse
    #[error("invalid producer address '{addr}': {message}")]
    InvalidAddress { addr: String, message: String },

    /// Send/receive failed
    #[error("producer link I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Message could not be encoded
    #[error("failed to encode {topic} message: {message}")]
    Encode { topic: &'static str, message: String },

    /// The other side went away
    #[error("producer link closed")]
    Closed,
}

impl ProducerLinkError {
    pub fn invalid_address(addr: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidAddress {
            addr: addr.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProducerLinkError>;
