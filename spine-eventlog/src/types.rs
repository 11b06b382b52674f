//! Event Log Types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle events recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    /// Engine accepted an instruction
    WorkflowStarted,
    /// A step attempt failed and will be retried
    StepRetry,
    /// A step succeeded
    StepCompleted,
    /// A step exhausted its retry budget
    StepFailed,
    /// Settlement was handed to the adapter and returned
    SettlementSubmitted,
    /// Terminal: every step and the settlement succeeded
    WorkflowCompleted,
    /// Terminal: a step or the settlement failed
    WorkflowFailed,
    /// Caller verified the agent's permission
    PermissionVerified,
    /// Caller was refused permission; nothing executed
    PermissionDenied,
    /// Caller replayed a cached result
    WorkflowIdempotentHit,
}

impl AuditEventKind {
    /// Wire name, as written to the audit log.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventKind::WorkflowStarted => "workflow_started",
            AuditEventKind::StepRetry => "step_retry",
            AuditEventKind::StepCompleted => "step_completed",
            AuditEventKind::StepFailed => "step_failed",
            AuditEventKind::SettlementSubmitted => "settlement_submitted",
            AuditEventKind::WorkflowCompleted => "workflow_completed",
            AuditEventKind::WorkflowFailed => "workflow_failed",
            AuditEventKind::PermissionVerified => "permission_verified",
            AuditEventKind::PermissionDenied => "permission_denied",
            AuditEventKind::WorkflowIdempotentHit => "workflow_idempotent_hit",
        }
    }

    /// Terminal events close an execution.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AuditEventKind::WorkflowCompleted | AuditEventKind::WorkflowFailed)
    }
}

impl std::fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable audit record. Never mutated or deleted once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    // Identity
    pub record_id: Uuid,

    // Correlation
    pub workflow_id: String,
    pub agent_id: String,

    // Event & Data
    pub event: AuditEventKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Event builder for audit appends
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub workflow_id: String,
    pub agent_id: String,
    pub kind: AuditEventKind,
    pub data: Option<serde_json::Value>,

    // Overrides the ledger clock when set
    pub timestamp: Option<DateTime<Utc>>,
}

impl AuditEvent {
    /// Create a new event
    pub fn new(
        workflow_id: impl Into<String>,
        agent_id: impl Into<String>,
        kind: AuditEventKind,
        data: serde_json::Value,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            agent_id: agent_id.into(),
            kind,
            data: Some(data),
            timestamp: None,
        }
    }

    /// Create an event without payload
    pub fn bare(
        workflow_id: impl Into<String>,
        agent_id: impl Into<String>,
        kind: AuditEventKind,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            agent_id: agent_id.into(),
            kind,
            data: None,
            timestamp: None,
        }
    }

    /// Pin the record timestamp (deterministic tests)
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Event log errors
#[derive(Debug, thiserror::Error)]
pub enum EventLogError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Journal unavailable: {0}")]
    Unavailable(String),
}

impl EventLogError {
    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, EventLogError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_kind_wire_names_match_as_str() {
        let kinds = [
            AuditEventKind::WorkflowStarted,
            AuditEventKind::StepRetry,
            AuditEventKind::StepCompleted,
            AuditEventKind::StepFailed,
            AuditEventKind::SettlementSubmitted,
            AuditEventKind::WorkflowCompleted,
            AuditEventKind::WorkflowFailed,
            AuditEventKind::PermissionVerified,
            AuditEventKind::PermissionDenied,
            AuditEventKind::WorkflowIdempotentHit,
        ];

        for kind in kinds {
            assert_eq!(serde_json::to_value(kind).unwrap(), json!(kind.as_str()));
        }
    }

    #[test]
    fn test_record_wire_shape() {
        let record = AuditRecord {
            record_id: Uuid::now_v7(),
            workflow_id: "wf-1".to_string(),
            agent_id: "a1".to_string(),
            event: AuditEventKind::StepRetry,
            timestamp: Utc::now(),
            data: Some(json!({"attempt": 1})),
        };

        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["event"], "step_retry");
        assert_eq!(value["workflowId"], "wf-1");
        assert!(value.get("recordId").is_some());
        assert_eq!(value["data"]["attempt"], 1);
    }

    #[test]
    fn test_terminal_kinds() {
        assert!(AuditEventKind::WorkflowCompleted.is_terminal());
        assert!(AuditEventKind::WorkflowFailed.is_terminal());
        assert!(!AuditEventKind::StepFailed.is_terminal());
    }
}
