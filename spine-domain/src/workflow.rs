//! Workflow instructions submitted by agents.
//!
//! An instruction is a flat, ordered list of steps bound to exactly one
//! settlement plan. Instructions are only ever constructed through
//! [`crate::validate_instruction`]; the serde derives exist so that the
//! validated form can be echoed into audit payloads and cached results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form step parameters (retry budget, delays, action arguments).
pub type Parameters = serde_json::Map<String, Value>;

/// Parameter key holding a step's retry budget.
pub const RETRIES_PARAM: &str = "retries";

/// Parameter key holding the reference executor's simulated delay.
pub const DELAY_MS_PARAM: &str = "delayMs";

// =============================================================================
// Instruction
// =============================================================================

/// A validated, agent-submitted workflow.
///
/// # Invariants
/// - `steps` is non-empty and executes in list order
/// - `settlement.token` is always USDC
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowInstruction {
    /// Client-chosen workflow identifier
    pub workflow_id: String,
    /// Submitting agent
    pub agent_id: String,
    /// When the agent created the instruction (defaults to receipt time)
    pub created_at: DateTime<Utc>,
    /// Permission artifact, filled in by the caller after verification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_id: Option<String>,
    /// Ordered steps
    pub steps: Vec<WorkflowStep>,
    /// Payment settled once every step succeeds
    pub settlement: SettlementPlan,
}

// =============================================================================
// Step
// =============================================================================

/// Step kind. Only plain actions exist; there is no branching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    /// Invoke the deployment's action executor
    #[serde(rename = "action")]
    Action,
}

/// One step of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    /// Step identifier, unique within the workflow by convention
    pub step_id: String,
    /// Always [`StepKind::Action`]
    #[serde(rename = "type")]
    pub kind: StepKind,
    /// Action name handed to the executor
    pub action: String,
    /// Optional parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Parameters>,
}

impl WorkflowStep {
    /// Create an action step without parameters.
    pub fn action(step_id: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            kind: StepKind::Action,
            action: action.into(),
            parameters: None,
        }
    }

    /// Attach parameters.
    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// Look up a single parameter.
    pub fn parameter(&self, key: &str) -> Option<&Value> {
        self.parameters.as_ref().and_then(|p| p.get(key))
    }

    /// Number of retries allowed after the first attempt.
    ///
    /// Non-numeric values read as 0, fractions are floored and negatives
    /// clamp to 0.
    pub fn retry_budget(&self) -> u32 {
        match self.parameter(RETRIES_PARAM).and_then(Value::as_f64) {
            Some(raw) if raw.is_finite() && raw > 0.0 => raw.floor().min(u32::MAX as f64) as u32,
            _ => 0,
        }
    }

    /// Simulated work delay in milliseconds, if the step asks for one.
    pub fn delay_ms(&self) -> Option<u64> {
        match self.parameter(DELAY_MS_PARAM).and_then(Value::as_f64) {
            Some(raw) if raw.is_finite() && raw > 0.0 => Some(raw as u64),
            _ => None,
        }
    }
}

// =============================================================================
// Settlement Plan
// =============================================================================

/// Settlement token. USDC is the only accepted asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Token {
    /// USD Coin
    #[serde(rename = "USDC")]
    Usdc,
}

/// Payment to settle after all steps complete.
///
/// The payment-proof fields are only required by the facilitator-backed
/// adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementPlan {
    /// Always USDC
    pub token: Token,
    /// Decimal amount, kept verbatim
    pub amount: String,
    /// Recipient address
    pub recipient: String,
    /// Target chain; also selects the facilitator network
    pub chain_id: u64,
    /// Free-form memo
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    /// Encoded payment header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_header: Option<String>,
    /// Payment requirements object the header was produced against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_requirements: Option<serde_json::Map<String, Value>>,
    /// Payment protocol version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x402_version: Option<u32>,
}

impl SettlementPlan {
    /// Create a USDC plan without payment proof.
    pub fn usdc(amount: impl Into<String>, recipient: impl Into<String>, chain_id: u64) -> Self {
        Self {
            token: Token::Usdc,
            amount: amount.into(),
            recipient: recipient.into(),
            chain_id,
            memo: None,
            payment_header: None,
            payment_requirements: None,
            x402_version: None,
        }
    }

    /// True when both the header and the requirements are present.
    pub fn has_payment_proof(&self) -> bool {
        self.payment_header.is_some() && self.payment_requirements.is_some()
    }
}

// =============================================================================
// Tests
// =============================================================================
