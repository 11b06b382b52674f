//! Execution layer port definitions.
//!
//! Ports define the interfaces the engine depends on (step actions,
//! permission verification and settlement). Adapters implement these ports
//! for specific backends (mock, facilitator, test doubles).

use async_trait::async_trait;

use spine_domain::{
    Parameters, PermissionCheck, PermissionRequest, SettlementContext, SettlementPlan,
    SettlementResult, WorkflowInstruction, WorkflowStep,
};

use crate::error::{ActionError, ExecResult};

// =============================================================================
// Action Port
// =============================================================================

/// Port for running one step attempt.
///
/// Implementations:
/// - `DelayActionExecutor` - Sleeps for `delayMs` and reports success
/// - Scripted executors in `spine-testkit`
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Run one attempt of `step`.
    ///
    /// # Returns
    ///
    /// The step output on success. An error consumes one attempt of the
    /// step's retry budget.
    async fn execute(
        &self,
        step: &WorkflowStep,
        instruction: &WorkflowInstruction,
    ) -> Result<Parameters, ActionError>;
}

// =============================================================================
// Settlement Port
// =============================================================================

/// Port for permission verification and payment settlement.
///
/// Implementations:
/// - `MockSettlement` - Always approves, deterministic transaction hashes
/// - `FacilitatorSettlement` - Delegates to an x402 facilitator
#[async_trait]
pub trait SettlementAdapter: Send + Sync {
    /// Check that the agent may spend the settlement amount.
    ///
    /// A check with `approved == false` is a terminal denial; the caller
    /// must not start the execution.
    async fn verify_permission(&self, request: &PermissionRequest) -> ExecResult<PermissionCheck>;

    /// Submit the payment. Called at most once per execution, and only
    /// after every step completed.
    async fn settle_payment(
        &self,
        plan: &SettlementPlan,
        context: &SettlementContext,
    ) -> ExecResult<SettlementResult>;
}
