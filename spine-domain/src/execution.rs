//! Execution results.
//!
//! One [`ExecutionResult`] is produced per engine invocation and never
//! mutated afterwards; the caller caches it under the idempotency key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::settlement::SettlementResult;
use crate::workflow::Parameters;

/// Overall outcome of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// Every step completed and settlement was submitted
    Completed,
    /// A step exhausted its retries or settlement failed
    Failed,
}

impl ExecutionStatus {
    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
        }
    }
}

/// Outcome of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// An attempt succeeded
    Completed,
    /// The retry budget ran out
    Failed,
}

/// Per-step record, appended in execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    /// Step identifier
    pub step_id: String,
    /// Action name
    pub action: String,
    /// Step outcome
    pub status: StepStatus,
    /// Attempts consumed, including the successful one
    pub attempts: u32,
    /// Before the first attempt
    pub started_at: DateTime<Utc>,
    /// After the last attempt
    pub finished_at: DateTime<Utc>,
    /// Executor output on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Parameters>,
    /// Last error on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepResult {
    /// Did the step complete?
    pub fn is_completed(&self) -> bool {
        self.status == StepStatus::Completed
    }
}

/// Immutable result of one workflow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// Workflow that was executed
    pub workflow_id: String,
    /// Fresh per invocation
    pub execution_id: Uuid,
    /// Overall outcome
    pub status: ExecutionStatus,
    /// One entry per step that ran, in order
    pub step_results: Vec<StepResult>,
    /// Present only when every step completed and settlement succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settlement: Option<SettlementResult>,
    /// Execution start
    pub started_at: DateTime<Utc>,
    /// Execution end
    pub finished_at: DateTime<Utc>,
    /// Id of the terminal audit record
    pub audit_record_id: Uuid,
}

impl ExecutionResult {
    /// Did the execution complete?
    pub fn is_completed(&self) -> bool {
        self.status == ExecutionStatus::Completed
    }
}
