//! Payment proof handling.
//!
//! Turns the proof fields of a settlement plan into a facilitator verify
//! request. All checks here are local and run before any network call.

use serde_json::{json, Map, Value};

use spine_domain::{
    CronosNetwork, PaymentRequirements, SettlementPlan, VerifyRequest, DEFAULT_X402_VERSION,
};

use crate::error::{ExecError, ExecResult};

const PLACEHOLDER_HEADER: &str = "mock-header";
const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Build the verify request for `plan`.
///
/// # Errors
///
/// `InvalidPaymentProof` when the header or requirements are missing, when
/// the requirements carry no network, or when that network does not match
/// the one selected by `chain_id`.
pub fn build_verify_request(plan: &SettlementPlan, chain_id: u64) -> ExecResult<VerifyRequest> {
    let payment_header = plan
        .payment_header
        .as_deref()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| {
            ExecError::InvalidPaymentProof("settlement.paymentHeader is required".to_string())
        })?;

    let raw_requirements = plan.payment_requirements.as_ref().ok_or_else(|| {
        ExecError::InvalidPaymentProof("settlement.paymentRequirements is required".to_string())
    })?;

    let payment_requirements: PaymentRequirements =
        serde_json::from_value(Value::Object(raw_requirements.clone())).map_err(|_| {
            ExecError::InvalidPaymentProof(
                "settlement.paymentRequirements.network must be a string".to_string(),
            )
        })?;

    let expected = CronosNetwork::from_chain_id(chain_id);
    if payment_requirements.network != expected.as_str() {
        return Err(ExecError::InvalidPaymentProof(format!(
            "paymentRequirements.network must be {} for chainId {}",
            expected, chain_id
        )));
    }

    Ok(VerifyRequest {
        x402_version: plan.x402_version.unwrap_or(DEFAULT_X402_VERSION),
        payment_header: payment_header.to_string(),
        payment_requirements,
    })
}

/// Build the verify request only when the plan carries a full proof.
///
/// A proof that is present is still checked.
pub fn maybe_build_verify_request(
    plan: &SettlementPlan,
    chain_id: u64,
) -> ExecResult<Option<VerifyRequest>> {
    if plan.has_payment_proof() {
        build_verify_request(plan, chain_id).map(Some)
    } else {
        Ok(None)
    }
}

/// Zero-value request recorded as evidence when no proof was supplied.
pub fn placeholder_verify_request(chain_id: u64) -> VerifyRequest {
    let network = CronosNetwork::from_chain_id(chain_id);

    let extra: Map<String, Value> = match json!({
        "scheme": "exact",
        "payTo": ZERO_ADDRESS,
        "asset": network.usdc_contract(),
        "description": "mock payment requirement",
        "mimeType": "application/json",
        "maxAmountRequired": "0",
        "maxTimeoutSeconds": 300
    }) {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    VerifyRequest {
        x402_version: DEFAULT_X402_VERSION,
        payment_header: PLACEHOLDER_HEADER.to_string(),
        payment_requirements: PaymentRequirements {
            network: network.as_str().to_string(),
            extra,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_with_proof(network: &str) -> SettlementPlan {
        let mut plan = SettlementPlan::usdc("1.00", "0xabc", 338);
        plan.payment_header = Some("header-abc".to_string());
        plan.payment_requirements = json!({"scheme": "exact", "network": network, "payTo": "0xabc"})
            .as_object()
            .cloned();
        plan
    }

    #[test]
    fn test_build_defaults_protocol_version() {
        let request = build_verify_request(&plan_with_proof("cronos-testnet"), 338).unwrap();

        assert_eq!(request.x402_version, 1);
        assert_eq!(request.payment_header, "header-abc");
        assert_eq!(request.payment_requirements.extra["payTo"], "0xabc");
    }

    #[test]
    fn test_build_requires_header() {
        let mut plan = plan_with_proof("cronos-testnet");
        plan.payment_header = None;

        let err = build_verify_request(&plan, 338).unwrap_err();
        assert!(err.to_string().contains("paymentHeader"));
    }

    #[test]
    fn test_build_requires_requirements() {
        let mut plan = plan_with_proof("cronos-testnet");
        plan.payment_requirements = None;

        assert!(matches!(
            build_verify_request(&plan, 338),
            Err(ExecError::InvalidPaymentProof(_))
        ));
    }

    #[test]
    fn test_build_rejects_network_mismatch() {
        let err = build_verify_request(&plan_with_proof("cronos-testnet"), 25).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid payment proof: paymentRequirements.network must be cronos for chainId 25"
        );

        assert!(build_verify_request(&plan_with_proof("cronos"), 25).is_ok());
    }

    #[test]
    fn test_maybe_build_without_proof() {
        let plan = SettlementPlan::usdc("1.00", "0xabc", 338);
        assert_eq!(maybe_build_verify_request(&plan, 338).unwrap(), None);
    }

    #[test]
    fn test_maybe_build_checks_present_proof() {
        assert!(maybe_build_verify_request(&plan_with_proof("cronos"), 338).is_err());
    }

    #[test]
    fn test_placeholder_follows_chain() {
        let mainnet = placeholder_verify_request(25);
        assert_eq!(mainnet.payment_requirements.network, "cronos");
        assert_eq!(
            mainnet.payment_requirements.extra["asset"],
            CronosNetwork::Mainnet.usdc_contract()
        );

        let testnet = placeholder_verify_request(338);
        assert_eq!(testnet.payment_header, "mock-header");
        assert_eq!(testnet.payment_requirements.network, "cronos-testnet");
        assert_eq!(testnet.payment_requirements.extra["maxAmountRequired"], "0");
    }
}
