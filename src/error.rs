//! Error types for studysync.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by the sync queue and its collaborators.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Malformed mutation payload. Deterministic, retrying cannot fix it.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Network failure or timeout while talking to the remote endpoint.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote endpoint rejected the mutation.
    #[error("Server rejected mutation{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Application {
        /// HTTP status, when the rejection came with one.
        status: Option<u16>,
        /// Server-provided or synthesized message.
        message: String,
    },

    /// The circuit breaker is open and refused the call.
    #[error("Circuit open: remote calls suspended for another {}ms", .retry_in.as_millis())]
    CircuitOpen {
        /// Time left until the breaker allows a trial call.
        retry_in: Duration,
    },

    /// Storage failure.
    #[error("Database error: {0}")]
    Database(String),

    /// Configuration could not be read, parsed or written.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failure.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A referenced item does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl SyncError {
    /// Whether a later attempt of the same mutation could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Application { .. } | Self::CircuitOpen { .. }
        )
    }

    /// Whether this is the breaker's availability signal rather than a failure.
    #[must_use]
    pub const fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Stable short name for logs and JSON output.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Transport(_) => "transport",
            Self::Application { .. } => "application",
            Self::CircuitOpen { .. } => "circuit_open",
            Self::Database(_) => "database",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Parse(_) => "parse",
            Self::NotFound(_) => "not_found",
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

impl From<serde_yaml::Error> for SyncError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}
