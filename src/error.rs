//! Error types for campaign throttling.

use thiserror::Error;

/// Main error type for campaign throttle operations.
#[derive(Error, Debug)]
pub enum ThrottleError {
    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A configuration value failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Counter store errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Record (de)serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote campaign pause/resume failures
    #[error("Campaign control error: {0}")]
    CampaignControl(String),

    /// Audit sink failures
    #[error("Audit error: {0}")]
    Audit(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for ThrottleError {
    fn from(e: config::ConfigError) -> Self {
        ThrottleError::Config(e.to_string())
    }
}

/// Result type alias for campaign throttle operations.
pub type Result<T> = std::result::Result<T, ThrottleError>;
