//! Audit ledger.
//!
//! Durable, append-only sink for workflow lifecycle events. Every append is
//! self-contained and is durable before it returns; a persistence failure is
//! always surfaced to the caller.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::journal::Journal;
use crate::types::{AuditEvent, AuditRecord, Result};

/// Append-only audit trail over a [`Journal`].
#[derive(Clone)]
pub struct AuditLedger {
    journal: Arc<dyn Journal>,
}

impl AuditLedger {
    /// Create a ledger writing to `journal`.
    pub fn new(journal: Arc<dyn Journal>) -> Self {
        Self { journal }
    }

    /// Append an event, assigning its record id and timestamp.
    ///
    /// # Errors
    /// - `Serialization` if the payload cannot be encoded
    /// - `Io`/`Unavailable` if the journal write fails
    pub async fn append(&self, event: AuditEvent) -> Result<AuditRecord> {
        let record = AuditRecord {
            record_id: Uuid::now_v7(),
            workflow_id: event.workflow_id,
            agent_id: event.agent_id,
            event: event.kind,
            timestamp: event.timestamp.unwrap_or_else(Utc::now),
            data: event.data,
        };

        let line = serde_json::to_string(&record)?;
        self.journal.append(&line).await?;

        debug!(
            record_id = %record.record_id,
            workflow_id = %record.workflow_id,
            event = %record.event,
            "Audit record appended"
        );

        Ok(record)
    }

    /// Read back every record in write order.
    ///
    /// For inspection only; lines that do not parse are skipped.
    pub async fn read_all(&self) -> Result<Vec<AuditRecord>> {
        let lines = self.journal.scan().await?;
        let mut records = Vec::with_capacity(lines.len());

        for line in lines {
            match serde_json::from_str::<AuditRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(error = %e, "Skipping unreadable audit line"),
            }
        }

        Ok(records)
    }

    /// Read back the records of one workflow, in emission order.
    pub async fn read_workflow(&self, workflow_id: &str) -> Result<Vec<AuditRecord>> {
        Ok(self
            .read_all()
            .await?
            .into_iter()
            .filter(|r| r.workflow_id == workflow_id)
            .collect())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::{FileJournal, MemoryJournal};
    use crate::types::AuditEventKind;
    use chrono::TimeZone;
    use serde_json::json;

    #[tokio::test]
    async fn test_append_assigns_id_and_timestamp() {
        let ledger = AuditLedger::new(Arc::new(MemoryJournal::new()));

        let first = ledger
            .append(AuditEvent::new(
                "wf-1",
                "a1",
                AuditEventKind::WorkflowStarted,
                json!({"steps": 2}),
            ))
            .await
            .unwrap();
        let second = ledger
            .append(AuditEvent::bare("wf-1", "a1", AuditEventKind::WorkflowCompleted))
            .await
            .unwrap();

        assert_ne!(first.record_id, second.record_id);
        assert!(second.timestamp >= first.timestamp);
        assert_eq!(first.data, Some(json!({"steps": 2})));
        assert_eq!(second.data, None);
    }

    #[tokio::test]
    async fn test_timestamp_override() {
        let ledger = AuditLedger::new(Arc::new(MemoryJournal::new()));
        let pinned = Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap();

        let record = ledger
            .append(AuditEvent::bare("wf-1", "a1", AuditEventKind::WorkflowStarted).at(pinned))
            .await
            .unwrap();

        assert_eq!(record.timestamp, pinned);
    }

    #[tokio::test]
    async fn test_failure_is_surfaced() {
        let journal = Arc::new(MemoryJournal::new());
        let ledger = AuditLedger::new(journal.clone());
        journal.set_fail_next(true);

        let result = ledger
            .append(AuditEvent::bare("wf-1", "a1", AuditEventKind::WorkflowStarted))
            .await;

        assert!(result.is_err());
        assert!(journal.is_empty());
    }

    #[tokio::test]
    async fn test_records_are_durable_and_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit").join("audit.jsonl");
        let ledger = AuditLedger::new(Arc::new(FileJournal::new(&path)));

        ledger
            .append(AuditEvent::bare("wf-1", "a1", AuditEventKind::WorkflowStarted))
            .await
            .unwrap();
        ledger
            .append(AuditEvent::bare("wf-2", "a2", AuditEventKind::WorkflowStarted))
            .await
            .unwrap();
        ledger
            .append(AuditEvent::bare("wf-1", "a1", AuditEventKind::WorkflowCompleted))
            .await
            .unwrap();

        // A fresh ledger over the same file sees the same records
        let reopened = AuditLedger::new(Arc::new(FileJournal::new(&path)));
        let events: Vec<_> = reopened
            .read_workflow("wf-1")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.event)
            .collect();

        assert_eq!(
            events,
            vec![AuditEventKind::WorkflowStarted, AuditEventKind::WorkflowCompleted]
        );
        assert_eq!(reopened.read_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_read_all_skips_garbage() {
        let journal = Arc::new(MemoryJournal::with_lines(["not json"]));
        let ledger = AuditLedger::new(journal);

        ledger
            .append(AuditEvent::bare("wf-1", "a1", AuditEventKind::WorkflowStarted))
            .await
            .unwrap();

        assert_eq!(ledger.read_all().await.unwrap().len(), 1);
    }
}
