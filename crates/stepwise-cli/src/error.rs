//! Stepwise player — error types.

use thiserror::Error;

/// Startup and runtime errors for the terminal player.
#[derive(Debug, Error)]
pub enum AppError {
    /// An argument or environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Reading the script or writing output failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// An event could not be written as JSON.
    #[error("output error: {0}")]
    Output(#[from] serde_json::Error),
}
