//! Event Log Module
//!
//! Provides append-only, line-delimited JSON journals and the audit ledger
//! written on top of them:
//! - Durable append (flushed and synced before returning)
//! - Full scan in write order on load
//! - Swappable backends behind the [`Journal`] trait
//!
//! # Usage
//!
//! ```rust,no_run
//! use spine_eventlog::{AuditEvent, AuditEventKind, AuditLedger, FileJournal};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let journal = Arc::new(FileJournal::new("./data/audit.jsonl"));
//! let ledger = AuditLedger::new(journal);
//!
//! let record = ledger
//!     .append(AuditEvent::new(
//!         "wf-1",
//!         "agent-1",
//!         AuditEventKind::WorkflowStarted,
//!         serde_json::json!({ "steps": 1 }),
//!     ))
//!     .await?;
//! println!("recorded {}", record.record_id);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

pub mod journal;
pub mod ledger;
pub mod types;

pub use journal::{FileJournal, Journal, MemoryJournal};
pub use ledger::AuditLedger;
pub use types::{AuditEvent, AuditEventKind, AuditRecord, EventLogError, Result};
