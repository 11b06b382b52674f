//! Spine Storage Layer
//!
//! Provides the idempotency store: a durable key → execution result cache.
//!
//! # Architecture
//!
//! - **Journal**: durable append + full scan (see `spine-eventlog`)
//! - **Cache**: fully loaded from the journal once, then written through
//!
//! # Usage
//!
//! ```rust,no_run
//! use spine_eventlog::FileJournal;
//! use spine_store::IdempotencyStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), spine_store::StoreError> {
//! let journal = Arc::new(FileJournal::new("./data/idempotency.jsonl"));
//! let store = IdempotencyStore::open(journal).await?;
//!
//! if let Some(entry) = store.get("wf-1:none").await? {
//!     println!("replaying execution {}", entry.response.execution_id);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

// Modules
mod entry;
mod error;
mod idempotency;

// Re-exports
pub use entry::{default_idempotency_key, IdempotencyEntry, Lookup};
pub use error::{StoreError, StoreResult};
pub use idempotency::IdempotencyStore;
