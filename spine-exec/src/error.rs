//! Execution layer error types.

use std::fmt;
use thiserror::Error;

/// Errors that can occur during execution operations.
///
/// Business outcomes (a step running out of retries, a denied permission)
/// are not errors; they are reported through typed results.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Audit ledger write failed; the execution is aborted
    #[error("Audit storage error: {0}")]
    Storage(#[from] spine_eventlog::EventLogError),

    /// Payment proof missing or inconsistent with the configured chain
    #[error("Invalid payment proof: {0}")]
    InvalidPaymentProof(String),

    /// Facilitator communication error
    #[error("Facilitator error: {0}")]
    Facilitator(#[from] spine_connectors::FacilitatorError),

    /// Settlement could not be completed
    #[error("Settlement error: {0}")]
    Settlement(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for execution operations.
pub type ExecResult<T> = Result<T, ExecError>;

/// Failure of a single step attempt.
///
/// Recorded on the step result and retried while budget remains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionError(String);

impl ActionError {
    /// Create an action error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// The failure message.
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ActionError {}

impl From<String> for ActionError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for ActionError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}
