//! Settlement and permission shapes shared by every adapter variant.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::workflow::{SettlementPlan, WorkflowInstruction};

/// Payment protocol version assumed when a plan does not carry one.
pub const DEFAULT_X402_VERSION: u32 = 1;

// =============================================================================
// Payment proof
// =============================================================================

/// Payment requirements the agent's payment header was produced against.
///
/// Only `network` is interpreted locally; every other field is forwarded to
/// the facilitator untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Facilitator network name (e.g. `cronos-testnet`)
    pub network: String,
    /// Remaining requirement fields (scheme, payTo, asset, amounts, ...)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Request body for facilitator verification and settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    /// Payment protocol version
    pub x402_version: u32,
    /// Encoded payment header
    pub payment_header: String,
    /// Requirements the header satisfies
    pub payment_requirements: PaymentRequirements,
}

// =============================================================================
// Permission
// =============================================================================

/// Input to permission verification.
#[derive(Debug, Clone, PartialEq)]
pub struct PermissionRequest {
    /// Workflow asking to spend
    pub workflow_id: String,
    /// Agent asking to spend
    pub agent_id: String,
    /// Permission artifact supplied by the agent, if any
    pub permission_id: Option<String>,
    /// The payment that will be settled
    pub settlement: SettlementPlan,
}

impl PermissionRequest {
    /// Build the request for an instruction.
    pub fn for_instruction(instruction: &WorkflowInstruction) -> Self {
        Self {
            workflow_id: instruction.workflow_id.clone(),
            agent_id: instruction.agent_id.clone(),
            permission_id: instruction.permission_id.clone(),
            settlement: instruction.settlement.clone(),
        }
    }
}

/// Verification request/response pair, kept as evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    /// What was verified
    pub request: VerifyRequest,
    /// What the verifier answered
    pub response: Value,
}

/// Result of permission verification.
///
/// A non-approved check is a terminal denial: no execution may start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionCheck {
    /// Whether spending is allowed
    pub approved: bool,
    /// Resolved permission id
    pub permission_id: String,
    /// Denial reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Evidence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
}

// =============================================================================
// Settlement
// =============================================================================

/// Identity of the execution a settlement belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementContext {
    /// Workflow being paid for
    pub workflow_id: String,
    /// Paying agent
    pub agent_id: String,
    /// Permission verified for the payment
    pub permission_id: Option<String>,
}

impl SettlementContext {
    /// Build the context for an instruction.
    pub fn for_instruction(instruction: &WorkflowInstruction) -> Self {
        Self {
            workflow_id: instruction.workflow_id.clone(),
            agent_id: instruction.agent_id.clone(),
            permission_id: instruction.permission_id.clone(),
        }
    }
}

/// Settlement network family reported in results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementNetwork {
    /// Cronos (mainnet or testnet, see `chainId`)
    Cronos,
}

/// Settlement progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    /// Handed off, finality not observed
    Submitted,
    /// Finality observed
    Confirmed,
}

/// Settlement request/response pair, kept as proof.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementProof {
    /// What was submitted
    pub request: VerifyRequest,
    /// What the settler answered
    pub response: Value,
}

/// Result of a settlement submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResult {
    /// Transaction hash, never empty
    pub tx_hash: String,
    /// Chain the payment was settled on
    pub chain_id: u64,
    /// Network family
    pub network: SettlementNetwork,
    /// Submission status
    pub status: SettlementStatus,
    /// Block explorer link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
    /// Request/response evidence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settlement_proof: Option<SettlementProof>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payment_requirements_keep_unknown_fields() {
        let raw = json!({
            "scheme": "exact",
            "network": "cronos-testnet",
            "payTo": "0xabc",
            "maxAmountRequired": "1000000"
        });

        let requirements: PaymentRequirements = serde_json::from_value(raw.clone()).unwrap();

        assert_eq!(requirements.network, "cronos-testnet");
        assert_eq!(requirements.extra["payTo"], "0xabc");
        assert_eq!(serde_json::to_value(&requirements).unwrap(), raw);
    }

    #[test]
    fn test_settlement_result_wire_shape() {
        let result = SettlementResult {
            tx_hash: "0x01".to_string(),
            chain_id: 338,
            network: SettlementNetwork::Cronos,
            status: SettlementStatus::Submitted,
            explorer_url: None,
            settlement_proof: None,
        };

        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value, json!({
            "txHash": "0x01",
            "chainId": 338,
            "network": "cronos",
            "status": "submitted"
        }));
    }
}
