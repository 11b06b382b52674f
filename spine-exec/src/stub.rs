//! Stub implementations for development and testing.
//!
//! These implementations simulate permission checks, settlement and step
//! actions without making real network calls.

use async_trait::async_trait;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use spine_domain::{
    explorer_url, Parameters, PermissionCheck, PermissionRequest, SettlementContext,
    SettlementNetwork, SettlementPlan, SettlementProof, SettlementResult, SettlementStatus,
    Verification, WorkflowInstruction, WorkflowStep,
};

use crate::error::{ActionError, ExecError, ExecResult};
use crate::ports::{ActionExecutor, SettlementAdapter};
use crate::proof::{maybe_build_verify_request, placeholder_verify_request};

// =============================================================================
// Mock Settlement
// =============================================================================

/// Mock settlement adapter.
///
/// Always approves and reports settlements as submitted. Transaction hashes
/// are derived from `(workflowId, amount, recipient)` so identical inputs
/// always reproduce the same hash.
pub struct MockSettlement {
    /// Chain used to select the network of proofs
    chain_id: u64,
    /// Whether to simulate a failure on the next call
    fail_next: AtomicBool,
    /// Number of settlements submitted
    settlements: AtomicU64,
}

impl MockSettlement {
    /// Create a mock adapter for `chain_id`.
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            fail_next: AtomicBool::new(false),
            settlements: AtomicU64::new(0),
        }
    }

    /// Configure the next call to fail.
    pub fn set_fail_next(&self, fail: bool) {
        self.fail_next.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `settle_payment` calls.
    pub fn settlement_count(&self) -> u64 {
        self.settlements.load(Ordering::SeqCst)
    }

    /// Check if we should fail the next operation.
    fn should_fail(&self) -> bool {
        self.fail_next.swap(false, Ordering::SeqCst)
    }
}

/// Deterministic mock transaction hash.
pub fn mock_tx_hash(workflow_id: &str, amount: &str, recipient: &str) -> String {
    let digest = Sha256::digest(format!("{}:{}:{}", workflow_id, amount, recipient).as_bytes());
    format!("0x{}", hex::encode(digest))
}

#[async_trait]
impl SettlementAdapter for MockSettlement {
    async fn verify_permission(&self, request: &PermissionRequest) -> ExecResult<PermissionCheck> {
        if self.should_fail() {
            return Err(ExecError::Settlement("Simulated verification failure".to_string()));
        }

        let verify_request = maybe_build_verify_request(&request.settlement, self.chain_id)?
            .unwrap_or_else(|| placeholder_verify_request(self.chain_id));

        let permission_id = request
            .permission_id
            .clone()
            .unwrap_or_else(|| format!("mock-{}", request.workflow_id));

        debug!(workflow_id = %request.workflow_id, %permission_id, "Mock: permission approved");

        Ok(PermissionCheck {
            approved: true,
            permission_id,
            reason: None,
            verification: Some(Verification {
                request: verify_request,
                response: json!({ "isValid": true, "invalidReason": Value::Null }),
            }),
        })
    }

    async fn settle_payment(
        &self,
        plan: &SettlementPlan,
        context: &SettlementContext,
    ) -> ExecResult<SettlementResult> {
        if self.should_fail() {
            return Err(ExecError::Settlement("Simulated settlement failure".to_string()));
        }

        let tx_hash = mock_tx_hash(&context.workflow_id, &plan.amount, &plan.recipient);
        let request = maybe_build_verify_request(plan, self.chain_id)?
            .unwrap_or_else(|| placeholder_verify_request(self.chain_id));

        self.settlements.fetch_add(1, Ordering::SeqCst);
        debug!(workflow_id = %context.workflow_id, %tx_hash, "Mock: settlement submitted");

        Ok(SettlementResult {
            explorer_url: explorer_url(plan.chain_id, &tx_hash),
            settlement_proof: Some(SettlementProof {
                request,
                response: json!({ "event": "payment.mock_submitted", "txHash": tx_hash }),
            }),
            tx_hash,
            chain_id: plan.chain_id,
            network: SettlementNetwork::Cronos,
            status: SettlementStatus::Submitted,
        })
    }
}

// =============================================================================
// Delay Action Executor
// =============================================================================

/// Reference action executor.
///
/// Sleeps for the step's `delayMs` parameter (or the configured default)
/// and reports `{ok: true, action}`.
pub struct DelayActionExecutor {
    default_delay: Duration,
}

impl DelayActionExecutor {
    /// Create an executor with a default per-step delay.
    pub fn new(default_delay: Duration) -> Self {
        Self { default_delay }
    }
}

impl Default for DelayActionExecutor {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

#[async_trait]
impl ActionExecutor for DelayActionExecutor {
    async fn execute(
        &self,
        step: &WorkflowStep,
        _instruction: &WorkflowInstruction,
    ) -> Result<Parameters, ActionError> {
        let delay = step.delay_ms().map(Duration::from_millis).unwrap_or(self.default_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut output = Parameters::new();
        output.insert("ok".to_string(), Value::Bool(true));
        output.insert("action".to_string(), Value::String(step.action.clone()));
        Ok(output)
    }
}

// =============================================================================
// Tests
// =============================================================================
