//! Idempotency store.
//!
//! Maps an idempotency key to the execution result produced for it. The full
//! journal is loaded into memory before the first read or write is served;
//! writes go to the journal first and are published to the cache only after
//! they are durable.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use spine_eventlog::Journal;

use crate::entry::{IdempotencyEntry, Lookup};
use crate::error::{StoreError, StoreResult};

type Cache = RwLock<HashMap<String, IdempotencyEntry>>;

/// Durable key → execution result cache.
///
/// Later writes for a key replace earlier ones, both in memory and when the
/// journal is replayed.
pub struct IdempotencyStore {
    journal: Arc<dyn Journal>,
    cache: OnceCell<Cache>,
    /// Held from append to publish so the cache applies writes in journal order
    write_lock: Mutex<()>,
}

impl IdempotencyStore {
    /// Create a store over `journal`. Loading happens lazily on first use.
    pub fn new(journal: Arc<dyn Journal>) -> Self {
        Self {
            journal,
            cache: OnceCell::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// Create a store and load the journal immediately.
    ///
    /// Surfaces load failures at startup instead of on the first request.
    pub async fn open(journal: Arc<dyn Journal>) -> StoreResult<Self> {
        let store = Self::new(journal);
        store.ready().await?;
        Ok(store)
    }

    /// Fetch the entry for `key`, if any.
    pub async fn get(&self, key: &str) -> StoreResult<Option<IdempotencyEntry>> {
        let cache = self.ready().await?;
        let entries = cache
            .read()
            .map_err(|e| StoreError::Unavailable(format!("Failed to acquire read lock: {}", e)))?;
        Ok(entries.get(key).cloned())
    }

    /// Fetch the entry for `key` and check it belongs to the caller.
    ///
    /// An entry written by a different workflow or agent is reported as
    /// [`Lookup::Conflict`] and must not be replayed.
    pub async fn lookup(
        &self,
        key: &str,
        workflow_id: &str,
        agent_id: &str,
    ) -> StoreResult<Lookup> {
        Ok(match self.get(key).await? {
            None => Lookup::Miss,
            Some(entry) if entry.matches(workflow_id, agent_id) => Lookup::Hit(entry),
            Some(entry) => Lookup::Conflict(entry),
        })
    }

    /// Persist `entry`, then make it visible to readers.
    ///
    /// If the journal write fails the cache is left untouched. Concurrent
    /// writes are applied one at a time, so the cached entry for a key is
    /// always the one a reload of the journal would produce.
    pub async fn set(&self, entry: IdempotencyEntry) -> StoreResult<()> {
        let cache = self.ready().await?;
        let line = serde_json::to_string(&entry)?;

        let _write = self.write_lock.lock().await;
        self.journal.append(&line).await?;

        let mut entries = cache
            .write()
            .map_err(|e| StoreError::Unavailable(format!("Failed to acquire write lock: {}", e)))?;

        debug!(
            idempotency_key = %entry.idempotency_key,
            execution_id = %entry.response.execution_id,
            "Idempotency entry stored"
        );
        entries.insert(entry.idempotency_key.clone(), entry);
        Ok(())
    }

    /// Number of cached keys.
    pub async fn len(&self) -> StoreResult<usize> {
        let cache = self.ready().await?;
        let entries = cache
            .read()
            .map_err(|e| StoreError::Unavailable(format!("Failed to acquire read lock: {}", e)))?;
        Ok(entries.len())
    }

    /// True when no keys are cached.
    pub async fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Resolve once the journal has been loaded.
    ///
    /// Concurrent callers wait on the same load. A failed load is retried by
    /// the next caller.
    async fn ready(&self) -> StoreResult<&Cache> {
        self.cache.get_or_try_init(|| self.load()).await
    }

    async fn load(&self) -> StoreResult<Cache> {
        let lines = self.journal.scan().await?;
        let mut entries = HashMap::new();
        let mut skipped = 0usize;

        for line in lines {
            match serde_json::from_str::<IdempotencyEntry>(&line) {
                Ok(entry) if !entry.idempotency_key.is_empty() => {
                    entries.insert(entry.idempotency_key.clone(), entry);
                }
                Ok(_) => skipped += 1,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable idempotency line");
                    skipped += 1;
                }
            }
        }

        info!(entries = entries.len(), skipped, "Idempotency store loaded");
        Ok(RwLock::new(entries))
    }
}

// =============================================================================
// Tests
// =============================================================================
