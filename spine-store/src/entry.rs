//! Idempotency entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use spine_domain::ExecutionResult;

/// Cached result for one idempotency key.
///
/// Created on the first non-duplicate request for a key and read-only
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdempotencyEntry {
    /// Client-supplied or derived key
    pub idempotency_key: String,
    /// Workflow that produced the result
    pub workflow_id: String,
    /// Agent that submitted it
    pub agent_id: String,
    /// Permission the execution ran under
    pub permission_id: String,
    /// When the entry was written
    pub created_at: DateTime<Utc>,
    /// The cached execution result
    pub response: ExecutionResult,
}

impl IdempotencyEntry {
    /// Does this entry belong to the given workflow/agent pair?
    pub fn matches(&self, workflow_id: &str, agent_id: &str) -> bool {
        self.workflow_id == workflow_id && self.agent_id == agent_id
    }
}

/// Outcome of a collision-checked lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Nothing cached under the key
    Miss,
    /// Cached entry for the same workflow/agent pair; replay it
    Hit(IdempotencyEntry),
    /// Key already used by a different workflow/agent pair
    Conflict(IdempotencyEntry),
}

/// Key used when the client does not supply one.
///
/// Format: `{workflow_id}:{permission_id or "none"}`
pub fn default_idempotency_key(workflow_id: &str, permission_id: Option<&str>) -> String {
    format!("{}:{}", workflow_id, permission_id.unwrap_or("none"))
}
