//! Error types for the gateway

use thiserror::Error;

/// Errors that stop the gateway from starting or reloading
///
/// Per-packet problems never surface here; adapters log and drop them.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Remote host name did not resolve
    #[error("cannot resolve {host}:{port}")]
    Resolve { host: String, port: u16 },

    /// Socket or file I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port failure on the transcoder device
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Transcoder did not answer the handshake or refused a request
    #[error("transcoder error: {0}")]
    Transcoder(String),

    /// ID lookup table could not be loaded
    #[error("lookup table {file}: {reason}")]
    Lookup { file: String, reason: String },

    /// Configuration is inconsistent
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file is not valid JSON
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}
