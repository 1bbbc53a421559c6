use std::time::Duration;
use thiserror::Error;

/// Bridge errors
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Transport Unavailable: the module channel is not open")]
    TransportUnavailable,

    #[error("Transport Error: the module channel was already opened once")]
    AlreadyOpened,

    #[error("Execution Error: {0}")]
    Execution(String),

    #[error("Syntax Error: {0}")]
    Syntax(String),

    #[error("Network Error: {reason}")]
    Network { status: Option<u16>, reason: String },

    #[error("Serialization Error: unrecognized value tag '{0}'")]
    Serialization(String),

    #[error("Peer Error: {0}")]
    Peer(String),

    #[error("Request {id} timed out after {after:?}")]
    Timeout { id: u64, after: Duration },

    #[error("Request {0} was cancelled")]
    Cancelled(u64),

    #[error("Channel Closed: {0}")]
    ChannelClosed(String),

    #[error("Framing Error: {0}")]
    Framing(String),

    #[error("Configuration Error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),

    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

/// Coarse classification of a [`BridgeError`], used when errors are surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    TransportUnavailable,
    Execution,
    Network,
    Serialization,
    Peer,
    Protocol,
    Configuration,
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::TransportUnavailable | BridgeError::AlreadyOpened => {
                ErrorKind::TransportUnavailable
            }
            BridgeError::Execution(_) | BridgeError::Syntax(_) => ErrorKind::Execution,
            BridgeError::Network { .. } => ErrorKind::Network,
            BridgeError::Serialization(_) => ErrorKind::Serialization,
            BridgeError::Peer(_) => ErrorKind::Peer,
            BridgeError::Timeout { .. }
            | BridgeError::Cancelled(_)
            | BridgeError::ChannelClosed(_)
            | BridgeError::Framing(_)
            | BridgeError::SerdeError(_)
            | BridgeError::IoError(_) => ErrorKind::Protocol,
            BridgeError::ConfigError(_) => ErrorKind::Configuration,
        }
    }
}

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;
