//! Engine: Runs one validated workflow instruction to a single result.
//!
//! # Flow
//!
//! ```text
//! workflow_started
//!   → per step: attempt → (step_retry)* → step_completed | step_failed
//!   → settlement (all steps completed only) → settlement_submitted
//!   → workflow_completed | workflow_failed
//! ```
//!
//! Every audit append is awaited before the engine moves on. A failed append
//! aborts the execution with [`ExecError::Storage`] and no result.

use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use spine_domain::{
    ExecutionResult, ExecutionStatus, SettlementContext, SettlementResult, StepResult, StepStatus,
    WorkflowInstruction, WorkflowStep,
};
use spine_eventlog::{AuditEvent, AuditEventKind, AuditLedger, AuditRecord};

use crate::error::{ExecError, ExecResult};
use crate::ports::{ActionExecutor, SettlementAdapter};

/// Reason recorded when a step fails without a message.
const UNKNOWN_ERROR: &str = "Unknown error";

// =============================================================================
// Engine
// =============================================================================

/// Workflow execution engine.
///
/// The engine:
/// 1. Runs steps strictly in order, retrying each within its budget
/// 2. Stops at the first step that exhausts its budget
/// 3. Settles exactly once, only when every step completed
/// 4. Records every transition in the audit ledger
///
/// It never checks permissions or idempotency; that is the caller's job.
#[derive(Clone)]
pub struct Engine {
    /// Runs step attempts
    actions: Arc<dyn ActionExecutor>,
    /// Submits the payment
    settlement: Arc<dyn SettlementAdapter>,
    /// Audit trail
    ledger: AuditLedger,
}

impl Engine {
    /// Create a new engine.
    pub fn new(
        actions: Arc<dyn ActionExecutor>,
        settlement: Arc<dyn SettlementAdapter>,
        ledger: AuditLedger,
    ) -> Self {
        Self { actions, settlement, ledger }
    }

    /// Audit ledger the engine writes to.
    pub fn ledger(&self) -> &AuditLedger {
        &self.ledger
    }

    /// Execute `instruction`.
    ///
    /// Step exhaustion and settlement failure produce a `failed` result, not
    /// an error.
    ///
    /// # Errors
    ///
    /// `Storage` if an audit append fails; no partial result is returned.
    pub async fn run(&self, instruction: &WorkflowInstruction) -> ExecResult<ExecutionResult> {
        let execution_id = Uuid::now_v7();
        let started_at = Utc::now();

        self.emit(
            instruction,
            AuditEventKind::WorkflowStarted,
            json!({ "executionId": execution_id, "steps": instruction.steps.len() }),
        )
        .await?;

        info!(
            workflow_id = %instruction.workflow_id,
            %execution_id,
            steps = instruction.steps.len(),
            "Workflow started"
        );

        let mut step_results = Vec::with_capacity(instruction.steps.len());
        let mut failure: Option<String> = None;

        for step in &instruction.steps {
            let result = self.run_step(instruction, step).await?;
            let error = (!result.is_completed())
                .then(|| result.error.clone().unwrap_or_else(|| UNKNOWN_ERROR.to_string()));
            step_results.push(result);

            if error.is_some() {
                failure = error;
                break;
            }
        }

        let mut settlement = None;
        if failure.is_none() {
            match self.settle(instruction).await? {
                Ok(result) => settlement = Some(result),
                Err(reason) => failure = Some(reason),
            }
        }

        let status = if failure.is_none() {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Failed
        };
        let terminal = match status {
            ExecutionStatus::Completed => AuditEventKind::WorkflowCompleted,
            ExecutionStatus::Failed => AuditEventKind::WorkflowFailed,
        };

        let mut data = json!({ "executionId": execution_id });
        if let Some(reason) = &failure {
            data["reason"] = Value::String(reason.clone());
        }

        let finished_at = Utc::now();
        let record = self.emit(instruction, terminal, data).await?;

        info!(
            workflow_id = %instruction.workflow_id,
            %execution_id,
            status = status.as_str(),
            reason = failure.as_deref().unwrap_or(""),
            "Workflow finished"
        );

        Ok(ExecutionResult {
            workflow_id: instruction.workflow_id.clone(),
            execution_id,
            status,
            step_results,
            settlement,
            started_at,
            finished_at,
            audit_record_id: record.record_id,
        })
    }

    /// Run one step until it succeeds or its retry budget is spent.
    async fn run_step(
        &self,
        instruction: &WorkflowInstruction,
        step: &WorkflowStep,
    ) -> ExecResult<StepResult> {
        let max_attempts = step.retry_budget().saturating_add(1);
        let started_at = Utc::now();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            match self.actions.execute(step, instruction).await {
                Ok(output) => {
                    let result = StepResult {
                        step_id: step.step_id.clone(),
                        action: step.action.clone(),
                        status: StepStatus::Completed,
                        attempts: attempt,
                        started_at,
                        finished_at: Utc::now(),
                        output: Some(output),
                        error: None,
                    };
                    let data = serde_json::to_value(&result)?;
                    self.emit(instruction, AuditEventKind::StepCompleted, data).await?;

                    debug!(step_id = %step.step_id, attempt, "Step completed");
                    return Ok(result);
                }
                Err(e) if attempt < max_attempts => {
                    warn!(
                        step_id = %step.step_id,
                        attempt,
                        error = %e,
                        "Step attempt failed, retrying"
                    );
                    self.emit(
                        instruction,
                        AuditEventKind::StepRetry,
                        json!({
                            "stepId": step.step_id,
                            "attempt": attempt,
                            "error": e.to_string(),
                        }),
                    )
                    .await?;
                }
                Err(e) => {
                    let result = StepResult {
                        step_id: step.step_id.clone(),
                        action: step.action.clone(),
                        status: StepStatus::Failed,
                        attempts: attempt,
                        started_at,
                        finished_at: Utc::now(),
                        output: None,
                        error: Some(e.to_string()),
                    };
                    let data = serde_json::to_value(&result)?;
                    self.emit(instruction, AuditEventKind::StepFailed, data).await?;

                    warn!(step_id = %step.step_id, attempts = attempt, error = %e, "Step failed");
                    return Ok(result);
                }
            }
        }
    }

    /// Settle the payment.
    ///
    /// The outer result carries storage failures; the inner one carries the
    /// settlement outcome, with the failure reason on error.
    async fn settle(
        &self,
        instruction: &WorkflowInstruction,
    ) -> ExecResult<Result<SettlementResult, String>> {
        let context = SettlementContext::for_instruction(instruction);

        match self.settlement.settle_payment(&instruction.settlement, &context).await {
            Ok(result) => {
                self.emit(
                    instruction,
                    AuditEventKind::SettlementSubmitted,
                    serde_json::to_value(&result)?,
                )
                .await?;
                Ok(Ok(result))
            }
            Err(ExecError::Storage(e)) => Err(ExecError::Storage(e)),
            Err(e) => {
                warn!(workflow_id = %instruction.workflow_id, error = %e, "Settlement failed");
                Ok(Err(e.to_string()))
            }
        }
    }

    async fn emit(
        &self,
        instruction: &WorkflowInstruction,
        kind: AuditEventKind,
        data: Value,
    ) -> ExecResult<AuditRecord> {
        let event = AuditEvent::new(&instruction.workflow_id, &instruction.agent_id, kind, data);
        Ok(self.ledger.append(event).await?)
    }
}

// =============================================================================
// Tests
// =============================================================================
