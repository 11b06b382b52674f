//! Instruction validation.
//!
//! Turns an untyped JSON payload into a [`WorkflowInstruction`] or fails on
//! the first violation with a field-qualified message. Partial instructions
//! are never produced.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::workflow::{
    Parameters, SettlementPlan, StepKind, Token, WorkflowInstruction, WorkflowStep,
};

/// A payload field failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field} must be {expected}")]
pub struct ValidationError {
    /// Qualified field path, e.g. `steps[0].stepId`
    pub field: String,
    /// What the field must be
    pub expected: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            expected: expected.into(),
        }
    }
}

type Result<T> = std::result::Result<T, ValidationError>;

/// Validate a payload, stamping `createdAt` with the current time when absent.
pub fn validate_instruction(payload: &Value) -> Result<WorkflowInstruction> {
    validate_instruction_at(payload, Utc::now())
}

/// Validate a payload using `now` as the default `createdAt`.
pub fn validate_instruction_at(payload: &Value, now: DateTime<Utc>) -> Result<WorkflowInstruction> {
    let root = match payload {
        Value::Object(map) => Fields::root(map),
        _ => return Err(ValidationError::new("payload", "an object")),
    };

    let workflow_id = root.string("workflowId")?;
    let agent_id = root.string("agentId")?;
    let created_at = root.timestamp("createdAt")?.unwrap_or(now);

    let steps = root
        .array("steps")?
        .iter()
        .enumerate()
        .map(|(index, raw)| read_step(&root, index, raw))
        .collect::<Result<Vec<_>>>()?;

    let settlement = read_settlement(&root.object("settlement")?)?;

    // Empty or non-string permission ids are treated as absent.
    let permission_id = root
        .get("permissionId")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(WorkflowInstruction {
        workflow_id,
        agent_id,
        created_at,
        permission_id,
        steps,
        settlement,
    })
}

fn read_step(root: &Fields<'_>, index: usize, raw: &Value) -> Result<WorkflowStep> {
    let path = root.qualified(&format!("steps[{}]", index));
    let step = match raw {
        Value::Object(map) => Fields::at(map, path),
        _ => return Err(ValidationError::new(path, "an object")),
    };

    let step_id = step.string("stepId")?;
    if step.string("type")? != "action" {
        return Err(ValidationError::new(step.qualified("type"), "'action'"));
    }
    let action = step.string("action")?;
    let parameters = step.optional_object("parameters")?;

    Ok(WorkflowStep {
        step_id,
        kind: StepKind::Action,
        action,
        parameters,
    })
}

fn read_settlement(settlement: &Fields<'_>) -> Result<SettlementPlan> {
    if settlement.string("token")? != "USDC" {
        return Err(ValidationError::new(settlement.qualified("token"), "USDC"));
    }

    Ok(SettlementPlan {
        token: Token::Usdc,
        amount: settlement.string("amount")?,
        recipient: settlement.string("recipient")?,
        chain_id: settlement.chain_id("chainId")?,
        memo: settlement.optional_string("memo", false)?,
        payment_header: settlement.optional_string("paymentHeader", true)?,
        payment_requirements: settlement.optional_object("paymentRequirements")?,
        x402_version: settlement.optional_u32("x402Version")?,
    })
}

// =============================================================================
// Field reader
// =============================================================================

/// Typed accessors over one JSON object, qualifying errors with its path.
struct Fields<'a> {
    map: &'a Map<String, Value>,
    path: String,
}

impl<'a> Fields<'a> {
    fn root(map: &'a Map<String, Value>) -> Self {
        Self::at(map, String::new())
    }

    fn at(map: &'a Map<String, Value>, path: String) -> Self {
        Self { map, path }
    }

    fn qualified(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.path, key)
        }
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    fn string(&self, key: &str) -> Result<String> {
        match self.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
            _ => Err(ValidationError::new(self.qualified(key), "a non-empty string")),
        }
    }

    fn optional_string(&self, key: &str, non_empty: bool) -> Result<Option<String>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) if !non_empty || !s.trim().is_empty() => Ok(Some(s.clone())),
            Some(_) if non_empty => Err(ValidationError::new(
                self.qualified(key),
                "a non-empty string when provided",
            )),
            Some(_) => Err(ValidationError::new(self.qualified(key), "a string when provided")),
        }
    }

    fn object(&self, key: &str) -> Result<Fields<'a>> {
        match self.get(key) {
            Some(Value::Object(map)) => Ok(Fields::at(map, self.qualified(key))),
            _ => Err(ValidationError::new(self.qualified(key), "an object")),
        }
    }

    fn optional_object(&self, key: &str) -> Result<Option<Parameters>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map.clone())),
            Some(_) => Err(ValidationError::new(self.qualified(key), "an object when provided")),
        }
    }

    fn array(&self, key: &str) -> Result<&'a Vec<Value>> {
        match self.get(key) {
            Some(Value::Array(items)) if !items.is_empty() => Ok(items),
            _ => Err(ValidationError::new(self.qualified(key), "a non-empty array")),
        }
    }

    fn chain_id(&self, key: &str) -> Result<u64> {
        self.get(key)
            .and_then(Value::as_u64)
            .ok_or_else(|| ValidationError::new(self.qualified(key), "a numeric chain id"))
    }

    fn optional_u32(&self, key: &str) -> Result<Option<u32>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .map(Some)
                .ok_or_else(|| ValidationError::new(self.qualified(key), "a number when provided")),
        }
    }

    fn timestamp(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
                .map(|t| Some(t.with_timezone(&Utc)))
                .map_err(|_| ValidationError::new(self.qualified(key), "an RFC 3339 timestamp")),
            Some(_) => Err(ValidationError::new(self.qualified(key), "an RFC 3339 timestamp")),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_payload() -> Value {
        json!({
            "workflowId": "wf-1",
            "agentId": "a1",
            "steps": [{"stepId": "s1", "type": "action", "action": "noop"}],
            "settlement": {"token": "USDC", "amount": "1.00", "recipient": "0xabc", "chainId": 338}
        })
    }

    fn field_of(payload: Value) -> String {
        validate_instruction(&payload).unwrap_err().field
    }

    #[test]
    fn test_valid_minimal_instruction() {
        let now = Utc::now();
        let instruction = validate_instruction_at(&valid_payload(), now).unwrap();

        assert_eq!(instruction.workflow_id, "wf-1");
        assert_eq!(instruction.agent_id, "a1");
        assert_eq!(instruction.created_at, now);
        assert_eq!(instruction.permission_id, None);
        assert_eq!(instruction.steps.len(), 1);
        assert_eq!(instruction.steps[0].kind, StepKind::Action);
        assert_eq!(instruction.settlement.chain_id, 338);
        assert_eq!(instruction.settlement.amount, "1.00");
    }

    #[test]
    fn test_full_instruction_with_payment_proof() {
        let mut payload = valid_payload();
        payload["createdAt"] = json!("2025-01-15T10:00:00Z");
        payload["permissionId"] = json!("perm-7");
        payload["steps"][0]["parameters"] = json!({"retries": 2});
        payload["settlement"]["memo"] = json!("invoice 12");
        payload["settlement"]["paymentHeader"] = json!("eyJ...");
        payload["settlement"]["paymentRequirements"] = json!({"network": "cronos-testnet"});
        payload["settlement"]["x402Version"] = json!(1);

        let instruction = validate_instruction(&payload).unwrap();

        assert_eq!(instruction.created_at.to_rfc3339(), "2025-01-15T10:00:00+00:00");
        assert_eq!(instruction.permission_id.as_deref(), Some("perm-7"));
        assert_eq!(instruction.steps[0].retry_budget(), 2);
        assert_eq!(instruction.settlement.memo.as_deref(), Some("invoice 12"));
        assert!(instruction.settlement.has_payment_proof());
        assert_eq!(instruction.settlement.x402_version, Some(1));
    }

    #[test]
    fn test_payload_must_be_object() {
        assert_eq!(field_of(json!([1, 2])), "payload");
        assert_eq!(field_of(json!("wf")), "payload");
    }

    #[test]
    fn test_identity_fields_required() {
        let mut payload = valid_payload();
        payload["workflowId"] = json!("   ");
        assert_eq!(field_of(payload), "workflowId");

        let mut payload = valid_payload();
        payload.as_object_mut().unwrap().remove("agentId");
        assert_eq!(field_of(payload), "agentId");
    }

    #[test]
    fn test_empty_steps_rejected() {
        let mut payload = valid_payload();
        payload["steps"] = json!([]);

        let err = validate_instruction(&payload).unwrap_err();
        assert_eq!(err.field, "steps");
        assert_eq!(err.to_string(), "steps must be a non-empty array");
    }

    #[test]
    fn test_step_errors_are_indexed() {
        let mut payload = valid_payload();
        payload["steps"] = json!([
            {"stepId": "s1", "type": "action", "action": "noop"},
            {"stepId": "s2", "type": "branch", "action": "noop"}
        ]);
        let err = validate_instruction(&payload).unwrap_err();
        assert_eq!(err.to_string(), "steps[1].type must be 'action'");

        let mut payload = valid_payload();
        payload["steps"] = json!(["s1"]);
        assert_eq!(field_of(payload), "steps[0]");

        let mut payload = valid_payload();
        payload["steps"][0]["action"] = json!("");
        assert_eq!(field_of(payload), "steps[0].action");

        let mut payload = valid_payload();
        payload["steps"][0]["parameters"] = json!([1]);
        assert_eq!(field_of(payload), "steps[0].parameters");
    }

    #[test]
    fn test_settlement_token_must_be_usdc() {
        let mut payload = valid_payload();
        payload["settlement"]["token"] = json!("USDT");

        let err = validate_instruction(&payload).unwrap_err();
        assert_eq!(err.to_string(), "settlement.token must be USDC");
    }

    #[test]
    fn test_settlement_fields() {
        let mut payload = valid_payload();
        payload["settlement"] = json!("USDC");
        assert_eq!(field_of(payload), "settlement");

        let mut payload = valid_payload();
        payload["settlement"]["amount"] = json!(1.0);
        assert_eq!(field_of(payload), "settlement.amount");

        let mut payload = valid_payload();
        payload["settlement"]["recipient"] = json!("");
        assert_eq!(field_of(payload), "settlement.recipient");

        let mut payload = valid_payload();
        payload["settlement"]["chainId"] = json!("338");
        assert_eq!(field_of(payload), "settlement.chainId");

        let mut payload = valid_payload();
        payload["settlement"]["chainId"] = json!(338.0);
        assert_eq!(field_of(payload), "settlement.chainId");

        let mut payload = valid_payload();
        payload["settlement"]["memo"] = json!(12);
        assert_eq!(field_of(payload), "settlement.memo");

        let mut payload = valid_payload();
        payload["settlement"]["paymentHeader"] = json!("");
        assert_eq!(field_of(payload), "settlement.paymentHeader");

        let mut payload = valid_payload();
        payload["settlement"]["paymentRequirements"] = json!("cronos");
        assert_eq!(field_of(payload), "settlement.paymentRequirements");

        let mut payload = valid_payload();
        payload["settlement"]["x402Version"] = json!("one");
        assert_eq!(field_of(payload), "settlement.x402Version");
    }

    #[test]
    fn test_created_at_must_be_rfc3339() {
        let mut payload = valid_payload();
        payload["createdAt"] = json!("yesterday");
        assert_eq!(field_of(payload), "createdAt");
    }

    #[test]
    fn test_blank_permission_id_is_absent() {
        let mut payload = valid_payload();
        payload["permissionId"] = json!("");

        let instruction = validate_instruction(&payload).unwrap();
        assert_eq!(instruction.permission_id, None);
    }

    #[test]
    fn test_null_optional_fields_are_absent() {
        let mut payload = valid_payload();
        payload["settlement"]["memo"] = Value::Null;
        payload["steps"][0]["parameters"] = Value::Null;

        let instruction = validate_instruction(&payload).unwrap();
        assert_eq!(instruction.settlement.memo, None);
        assert_eq!(instruction.steps[0].parameters, None);
    }
}
