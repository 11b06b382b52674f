//! Append-only journals.
//!
//! A journal stores one self-describing JSON document per line. It offers
//! exactly two operations: a durable append and a full scan in write order.
//! Both the audit ledger and the idempotency store sit on this interface, so
//! the backend can change without touching either of them.

use async_trait::async_trait;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::types::{EventLogError, Result};

// =============================================================================
// Journal Port
// =============================================================================

/// Durable append + full scan.
#[async_trait]
pub trait Journal: Send + Sync {
    /// Append one line. Returns only once the line is durable.
    ///
    /// `line` must not contain a newline.
    async fn append(&self, line: &str) -> Result<()>;

    /// Read every non-blank line in write order.
    ///
    /// A journal that was never written scans as empty.
    async fn scan(&self) -> Result<Vec<String>>;
}

// =============================================================================
// File Journal
// =============================================================================

/// Line-delimited file journal.
///
/// Parent directories are created on the first append. A partial last line
/// left by a crash is terminated before anything new is written, and lines
/// that are not valid UTF-8 are skipped on scan.
pub struct FileJournal {
    path: PathBuf,
    /// Serializes appends so lines never interleave. Holds `true` once the
    /// file is known to end on a line boundary.
    write_lock: Mutex<bool>,
}

impl FileJournal {
    /// Create a journal backed by `path`. Nothing is touched until use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(false),
        }
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn display_path(&self) -> String {
        self.path.display().to_string()
    }

    async fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| EventLogError::io(parent.display().to_string(), e))?;
            }
        }
        Ok(())
    }

    /// True when the file is non-empty and its last byte is not a newline.
    async fn has_torn_tail(&self, file: &mut File) -> std::io::Result<bool> {
        let len = file.metadata().await?.len();
        if len == 0 {
            return Ok(false);
        }

        file.seek(SeekFrom::Start(len - 1)).await?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last).await?;
        Ok(last[0] != b'\n')
    }

    async fn write_durably(&self, file: &mut File, buffer: &[u8]) -> std::io::Result<()> {
        file.write_all(buffer).await?;
        file.flush().await?;
        file.sync_data().await
    }
}

#[async_trait]
impl Journal for FileJournal {
    async fn append(&self, line: &str) -> Result<()> {
        let mut at_boundary = self.write_lock.lock().await;

        self.ensure_parent().await?;

        // Append mode: every write lands at the end whatever the read cursor.
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| EventLogError::io(self.display_path(), e))?;

        let mut buffer = Vec::with_capacity(line.len() + 2);
        if !*at_boundary {
            let torn = self
                .has_torn_tail(&mut file)
                .await
                .map_err(|e| EventLogError::io(self.display_path(), e))?;
            if torn {
                warn!(
                    path = %self.path.display(),
                    "Journal ends with a partial line, terminating it"
                );
                buffer.push(b'\n');
            }
        }
        buffer.extend_from_slice(line.as_bytes());
        buffer.push(b'\n');

        let written = self.write_durably(&mut file, &buffer).await;
        *at_boundary = written.is_ok();
        written.map_err(|e| EventLogError::io(self.display_path(), e))?;

        debug!(path = %self.path.display(), bytes = buffer.len(), "Journal line appended");
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<String>> {
        let contents = match fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(EventLogError::io(self.display_path(), e)),
        };

        let mut lines = Vec::new();
        for (index, raw) in contents.split(|b| *b == b'\n').enumerate() {
            match String::from_utf8(raw.to_vec()) {
                Ok(line) if line.trim().is_empty() => {}
                Ok(line) => lines.push(line.trim_end().to_string()),
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        line = index + 1,
                        error = %e,
                        "Skipping non UTF-8 journal line"
                    );
                }
            }
        }
        Ok(lines)
    }
}

// =============================================================================
// Memory Journal
// =============================================================================

/// In-process journal for tests and ephemeral deployments.
pub struct MemoryJournal {
    lines: RwLock<Vec<String>>,
    /// Whether to simulate a failure on the next append
    fail_next: AtomicBool,
}

impl MemoryJournal {
    /// Create an empty journal.
    pub fn new() -> Self {
        Self {
            lines: RwLock::new(Vec::new()),
            fail_next: AtomicBool::new(false),
        }
    }

    /// Create a journal preloaded with raw lines.
    pub fn with_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let journal = Self::new();
        if let Ok(mut stored) = journal.lines.write() {
            stored.extend(lines.into_iter().map(Into::into));
        }
        journal
    }

    /// Configure the next append to fail.
    pub fn set_fail_next(&self, fail: bool) {
        self.fail_next.store(fail, Ordering::SeqCst);
    }

    /// Number of stored lines.
    pub fn len(&self) -> usize {
        self.lines.read().map(|l| l.len()).unwrap_or(0)
    }

    /// True when nothing was appended.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryJournal {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Journal for MemoryJournal {
    async fn append(&self, line: &str) -> Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(EventLogError::Unavailable("Simulated journal failure".to_string()));
        }

        let mut lines = self
            .lines
            .write()
            .map_err(|e| {
                EventLogError::Unavailable(format!("Failed to acquire write lock: {}", e))
            })?;
        lines.push(line.to_string());
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<String>> {
        let lines = self
            .lines
            .read()
            .map_err(|e| {
                EventLogError::Unavailable(format!("Failed to acquire read lock: {}", e))
            })?;
        Ok(lines.clone())
    }
}

// =============================================================================
// Tests
// =============================================================================
