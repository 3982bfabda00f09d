use thiserror::Error;

use foreman_rules::RuleError;

/// Errors that may abort an evaluation pass.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("rule storage unavailable: {0}")]
    Storage(String),
    #[error("ledger storage unavailable: {0}")]
    Ledger(String),
    #[error("snapshot unavailable for client {client_id}: {message}")]
    SnapshotUnavailable { client_id: String, message: String },
}

impl From<RuleError> for EngineError {
    fn from(err: RuleError) -> Self {
        EngineError::Storage(err.to_string())
    }
}

/// Errors from starting a single remote task.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid task runner url {url}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("task runner transport error: {0}")]
    Transport(String),
    #[error("task runner returned unexpected status {status}")]
    UnexpectedStatus { status: reqwest::StatusCode },
    #[error("failed to decode task runner response: {0}")]
    Decode(String),
    #[error("task start timed out")]
    Timeout,
    #[error("task rejected: {reason}")]
    Rejected { reason: String },
}
