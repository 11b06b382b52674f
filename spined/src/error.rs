//! Daemon error types.

use spine_domain::ValidationError;
use spine_eventlog::EventLogError;
use spine_exec::ExecError;
use spine_store::StoreError;
use thiserror::Error;

/// Daemon-level errors.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Instruction payload rejected
    #[error("Invalid instruction: {0}")]
    Validation(#[from] ValidationError),

    /// Execution error
    #[error("Execution error: {0}")]
    Exec(#[from] ExecError),

    /// Idempotency store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Audit ledger error
    #[error("Audit error: {0}")]
    Audit(#[from] EventLogError),

    /// Key already bound to a different workflow/agent pair
    #[error("Idempotency-Key collision detected")]
    IdempotencyConflict {
        /// The contested key
        key: String,
    },

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Server I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal state is unusable (e.g. a poisoned lock)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for daemon operations.
pub type DaemonResult<T> = Result<T, DaemonError>;
