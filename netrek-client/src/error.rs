//! Error taxonomy (§7), client side. Transport errors mirror
//! `netrek-server`'s; `CircuitOpenError` and `HandshakeError` have no
//! server-side counterpart.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection closed by peer")]
    Eof,
    #[error("operation timed out after {0:?}")]
    DeadlineExceeded(std::time::Duration),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("transport error during handshake: {0}")]
    Transport(#[from] TransportError),
    #[error("server rejected connection: {0}")]
    Rejected(String),
    #[error("server sent an unexpected response to ConnectRequest")]
    UnexpectedResponse,
}

#[derive(Debug, Error)]
pub enum CircuitError {
    #[error("circuit breaker is open")]
    Open,
    #[error("operation failed: {0}")]
    Operation(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, source: serde_json::Error },
    #[error("config field {field} out of range: {reason}")]
    OutOfRange { field: String, reason: String },
    #[error("failed to write default config to {path}: {source}")]
    Write { path: String, source: std::io::Error },
}
