use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] fieldmark_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid coordinate '{0}': expected 'lat,lng' in decimal degrees")]
    InvalidCoordinate(String),
    #[error("Marking not found for id: {0}")]
    MarkingNotFound(String),
    #[error(
        "Remote store is not configured. Set FIELDMARK_REMOTE_URL and FIELDMARK_REMOTE_API_KEY to enable device presence."
    )]
    RemoteNotConfigured,
    #[error("Configuration error: {0}")]
    Config(String),
}
