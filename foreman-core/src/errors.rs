use std::io;

use thiserror::Error;

/// Result type used across the Foreman crates.
pub type Result<T> = std::result::Result<T, ForemanError>;

/// Canonical error representation shared by the Foreman services.
#[derive(Debug, Error)]
pub enum ForemanError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("general error: {0}")]
    General(String),
}

impl From<serde_json::Error> for ForemanError {
    fn from(err: serde_json::Error) -> Self {
        ForemanError::Serialization(err.to_string())
    }
}

/// Dedicated configuration error used by the configuration module.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for environment variable {key}: {message}")]
    InvalidEnvVar { key: &'static str, message: String },
}

impl From<ConfigError> for ForemanError {
    fn from(value: ConfigError) -> Self {
        ForemanError::Config(value.to_string())
    }
}
