//! Facilitator-backed settlement adapter.
//!
//! Requires a payment proof on every plan. The proof is checked locally
//! before the facilitator is contacted.

use async_trait::async_trait;
use tracing::{info, warn};

use spine_connectors::FacilitatorClient;
use spine_domain::{
    explorer_url, PermissionCheck, PermissionRequest, SettlementContext, SettlementNetwork,
    SettlementPlan, SettlementProof, SettlementResult, SettlementStatus, Verification,
};

use crate::error::{ExecError, ExecResult};
use crate::ports::SettlementAdapter;
use crate::proof::build_verify_request;

/// Settlement adapter delegating to an x402 facilitator.
pub struct FacilitatorSettlement {
    client: FacilitatorClient,
    /// Selects the network proofs must target
    chain_id: u64,
}

impl FacilitatorSettlement {
    /// Create an adapter over `client` for `chain_id`.
    pub fn new(client: FacilitatorClient, chain_id: u64) -> Self {
        Self { client, chain_id }
    }
}

#[async_trait]
impl SettlementAdapter for FacilitatorSettlement {
    async fn verify_permission(&self, request: &PermissionRequest) -> ExecResult<PermissionCheck> {
        let verify_request = build_verify_request(&request.settlement, self.chain_id)?;
        let response = self.client.verify(&verify_request).await?;

        let permission_id = request
            .permission_id
            .clone()
            .unwrap_or_else(|| format!("verified-{}", request.workflow_id));

        if response.is_valid {
            info!(
                workflow_id = %request.workflow_id,
                %permission_id,
                "Facilitator approved payment"
            );
        } else {
            warn!(
                workflow_id = %request.workflow_id,
                reason = response.invalid_reason.as_deref().unwrap_or("unspecified"),
                "Facilitator rejected payment"
            );
        }

        Ok(PermissionCheck {
            approved: response.is_valid,
            permission_id,
            reason: response.invalid_reason.clone(),
            verification: Some(Verification {
                request: verify_request,
                response: serde_json::to_value(&response)?,
            }),
        })
    }

    async fn settle_payment(
        &self,
        plan: &SettlementPlan,
        context: &SettlementContext,
    ) -> ExecResult<SettlementResult> {
        let request = build_verify_request(plan, self.chain_id)?;
        let response = self.client.settle(&request).await?;

        let tx_hash = response.tx_hash().map(str::to_string).ok_or_else(|| {
            ExecError::Settlement("Facilitator settlement did not return txHash".to_string())
        })?;

        let status = if response.is_settled() {
            SettlementStatus::Confirmed
        } else {
            SettlementStatus::Submitted
        };

        info!(
            workflow_id = %context.workflow_id,
            %tx_hash,
            ?status,
            "Facilitator settlement accepted"
        );

        Ok(SettlementResult {
            explorer_url: explorer_url(plan.chain_id, &tx_hash),
            settlement_proof: Some(SettlementProof {
                request,
                response: serde_json::to_value(&response)?,
            }),
            tx_hash,
            chain_id: plan.chain_id,
            network: SettlementNetwork::Cronos,
            status,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
