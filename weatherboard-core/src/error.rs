use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single weather fetch.
///
/// The two precondition variants (`InvalidInput`, `Config`) are raised before
/// any request is sent. The remaining four mirror the transport outcome.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("City name cannot be empty")]
    InvalidInput,

    #[error("Weather API is not configured: {0}")]
    Config(String),

    #[error("Network connection failed: {0}")]
    Network(String),

    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Failed to read response body: {0}")]
    Transport(String),

    #[error("Failed to parse weather data: {0}")]
    Decode(String),
}

impl FetchError {
    /// Short machine-readable label for the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::InvalidInput => "invalid_input",
            FetchError::Config(_) => "config",
            FetchError::Network(_) => "network",
            FetchError::Http { .. } => "http",
            FetchError::Transport(_) => "transport",
            FetchError::Decode(_) => "decode",
        }
    }
}

/// Failure of a record store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Record store is unavailable: {0}")]
    Unavailable(String),

    #[error("Record store I/O error: {0}")]
    Io(#[from] rusqlite::Error),

    #[error("A record store is already open at {}", .0.display())]
    AlreadyOpen(PathBuf),
}

impl StoreError {
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::InvalidInput(_) => "invalid_input",
            StoreError::Unavailable(_) => "unavailable",
            StoreError::Io(_) => "io",
            StoreError::AlreadyOpen(_) => "already_open",
        }
    }
}
