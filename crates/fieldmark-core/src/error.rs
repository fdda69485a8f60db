//! Error types for fieldmark-core

use thiserror::Error;

/// Result type alias using fieldmark-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in fieldmark-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error (connection refused, timeout, DNS)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend rejected the request with a non-2xx status
    #[error("Backend API error: {message} ({status})")]
    Api { status: u16, message: String },

    /// Backend responded with a payload we could not interpret
    #[error("Malformed payload: {0}")]
    Payload(String),

    /// No backend in the chain produced a usable response
    #[error("No backend available: {0}")]
    Unavailable(String),

    /// Marking not found
    #[error("Marking not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// True when the backend rejected our credentials (HTTP 401/403).
    ///
    /// These are surfaced with dedicated guidance instead of the generic
    /// "backend unavailable" logging, since retrying will not help.
    #[must_use]
    pub const fn is_permission_denied(&self) -> bool {
        matches!(self, Self::Api { status: 401 | 403, .. })
    }
}
