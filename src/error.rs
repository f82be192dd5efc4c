//! # Error Types
//!
//! Custom error types for Bike Dash using `thiserror`.

use thiserror::Error;

/// Main error type for Bike Dash
#[derive(Debug, Error)]
pub enum BikeDashError {
    /// Refuel text could not be interpreted as a fuel quantity
    #[error("Could not understand the fuel amount: {0}")]
    Parse(String),

    /// A record or settings value violates an invariant
    #[error("Validation error: {0}")]
    Validation(String),

    /// Durable storage read or write failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Advisory backend failed to answer
    #[error("Advisory service error: {0}")]
    Advisory(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Bike Dash
pub type Result<T> = std::result::Result<T, BikeDashError>;
