//! Error types for the diamond SDN controller

use crate::Dpid;
use thiserror::Error;

/// Controller error type
#[derive(Error, Debug)]
pub enum SdnError {
    /// Probe frame payload too short to carry a timestamp
    #[error("malformed probe payload: expected 4 bytes, got {len}")]
    MalformedProbe {
        /// Payload length received
        len: usize,
    },

    /// Frame could not be parsed
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// Unknown host name or address
    #[error("unknown host: {0}")]
    UnknownHost(String),

    /// Switch role not (yet) bound to a datapath
    #[error("switch {0} not connected")]
    NotConnected(String),

    /// Datapath id with no known role
    #[error("unknown datapath: {0}")]
    UnknownDatapath(Dpid),

    /// Invalid intent declaration
    #[error("invalid intent: {0}")]
    InvalidIntent(String),

    /// Control channel failure
    #[error("control channel error: {0}")]
    Channel(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration error
    #[error("config error: {0}")]
    ConfigError(String),
}

/// Result type for the controller
pub type SdnResult<T> = Result<T, SdnError>;
