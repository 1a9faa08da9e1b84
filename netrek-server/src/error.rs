//! Error taxonomy (§7). Each variant maps to one of the spec's categories;
//! see each module for which errors are connection-fatal versus
//! message-local.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("message exceeds max size of {max} bytes ({actual} bytes)")]
    OversizeMessage { max: usize, actual: usize },
    #[error("invalid JSON: {0}")]
    MalformedJson(String),
    #[error("player name must be 1-32 characters after trimming")]
    InvalidPlayerName,
    #[error("chat message must be 1-256 characters after trimming")]
    InvalidChatMessage,
    #[error("invalid team id {0}")]
    InvalidTeamId(i64),
    #[error("beam amount must be 0-1000, got {0}")]
    InvalidBeamAmount(i64),
    #[error("weapon index must be -1 or 0-7, got {0}")]
    InvalidWeaponIndex(i32),
    #[error("rate limit exceeded")]
    RateLimited,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame payload of {0} bytes exceeds the 64 KiB limit")]
    FrameTooLarge(usize),
}

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
pub enum GovernorError {
    #[error("task ceiling reached ({current}/{max})")]
    TaskCeilingReached { current: usize, max: usize },
    #[error("shut down timed out with {remaining} tasks still running")]
    ShutdownTimedOut { remaining: usize },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("field '{field}' out of range: {reason}")]
    OutOfRange { field: String, reason: String },
    #[error("failed to write default config to {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
