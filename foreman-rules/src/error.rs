use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

/// Errors produced when authoring, storing or loading foreman rules.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("invalid rule: {reason}")]
    InvalidRule { reason: String },
    #[error("malformed pattern {pattern:?}")]
    MalformedPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("rule index {index} out of range for set of {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("rule not found: {id}")]
    NotFound { id: Uuid },
    #[error("duplicate rule identifier detected: {id}")]
    DuplicateRule { id: Uuid },
    #[error("rule storage unavailable: {message}")]
    StorageUnavailable { message: String },
    #[error("rules path does not exist: {0}")]
    MissingPath(String),
    #[error("failed to read rules from {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse rules from {path}: {message}")]
    Parse { path: String, message: String },
}

impl RuleError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        RuleError::InvalidRule {
            reason: reason.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        RuleError::StorageUnavailable {
            message: message.into(),
        }
    }

    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RuleError::Io {
            path: path.into().display().to_string(),
            source,
        }
    }

    pub fn parse_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        RuleError::Parse {
            path: path.into().display().to_string(),
            message: message.into(),
        }
    }
}
