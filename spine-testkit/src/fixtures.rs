//! Sample payloads and scratch directories.

use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use spine_domain::{validate_instruction, WorkflowInstruction};

use crate::Result;

/// Raw instruction payload with one `noop` step, settled on Cronos testnet.
pub fn sample_payload(workflow_id: &str) -> Value {
    json!({
        "workflowId": workflow_id,
        "agentId": "a1",
        "steps": [
            { "stepId": "s1", "type": "action", "action": "noop" }
        ],
        "settlement": {
            "token": "USDC",
            "amount": "1.00",
            "recipient": "0xabc",
            "chainId": 338
        }
    })
}

/// Validated form of [`sample_payload`].
pub fn sample_instruction(workflow_id: &str) -> Result<WorkflowInstruction> {
    Ok(validate_instruction(&sample_payload(workflow_id))?)
}

/// Temporary data directory holding the daemon's journals.
///
/// Deleted when dropped.
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Create a fresh directory.
    pub fn new() -> Result<Self> {
        Ok(Self { dir: tempfile::tempdir()? })
    }

    /// Directory root.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Audit journal location.
    pub fn audit_path(&self) -> PathBuf {
        self.dir.path().join("audit.jsonl")
    }

    /// Idempotency journal location.
    pub fn idempotency_path(&self) -> PathBuf {
        self.dir.path().join("idempotency.jsonl")
    }
}
