//! Error types for the validation pipeline.

use thiserror::Error;

/// Main error type for validation operations.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Backtest runner failed: {0}")]
    RunnerError(String),

    #[error("Parameter optimizer failed: {0}")]
    OptimizerError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for validation operations.
pub type Result<T> = std::result::Result<T, ValidationError>;
