//! Sync journal: the persistent per-file record store
//!
//! The journal lives in a single JSON document:
//!
//! ```text
//! .davlock/                 # Journal directory (configurable)
//!   journal.json            # { "records": { "<path>": FileRecord, ... } }
//!   journal.json.lock       # Advisory lock serializing writers
//! ```
//!
//! A `FileRecord` is owned by the sync engine; the lock subsystem only sees
//! the `lock` subset through [`LockRecordStore`]. Both kinds of writers do a
//! read-modify-write under the journal lock and each only replaces the fields
//! it owns, so a sync pass never loses a concurrent lock write and vice versa.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fs_lock::{self, JournalLock, DEFAULT_JOURNAL_LOCK_TIMEOUT_MS};
use crate::lock_state::LockInfo;

/// Name of the journal document inside the journal directory
pub const JOURNAL_FILE: &str = "journal.json";

// =============================================================================
// Record store seam
// =============================================================================

/// Narrow read/write capability over the lock subset of per-file records
///
/// Paths are folder-relative journal keys without a leading `/`.
pub trait LockRecordStore: Send + Sync {
    /// Last known lock; the unlocked zero value when nothing is recorded
    fn read(&self, path: &str) -> LockInfo;

    /// Replace the stored lock as a whole
    fn write(&self, path: &str, info: &LockInfo) -> Result<()>;
}

// =============================================================================
// Records
// =============================================================================

/// Persisted sync record of one file
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,

    /// Seconds since epoch
    #[serde(default)]
    pub modtime: i64,

    #[serde(default)]
    pub size: u64,

    #[serde(default)]
    pub lock: LockInfo,
}

impl FileRecord {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct JournalDocument {
    #[serde(default)]
    records: BTreeMap<String, FileRecord>,
}

// =============================================================================
// File-backed journal
// =============================================================================

/// File-backed sync journal
#[derive(Debug, Clone)]
pub struct SyncJournal {
    file: PathBuf,
    lock_timeout_ms: u64,
}

impl SyncJournal {
    /// Open (lazily create) the journal in `dir`
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        Ok(Self {
            file: dir.join(JOURNAL_FILE),
            lock_timeout_ms: DEFAULT_JOURNAL_LOCK_TIMEOUT_MS,
        })
    }

    pub fn with_lock_timeout(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    /// Path to the journal document
    pub fn path(&self) -> &Path {
        &self.file
    }

    /// Read one record
    pub fn get_file_record(&self, path: &str) -> Result<Option<FileRecord>> {
        let key = journal_key(path);
        let _lock = JournalLock::acquire(&self.file, self.lock_timeout_ms)?;
        let mut doc = self.load()?;
        Ok(doc.records.remove(&key))
    }

    /// All recorded paths, sorted
    pub fn paths(&self) -> Result<Vec<String>> {
        let _lock = JournalLock::acquire(&self.file, self.lock_timeout_ms)?;
        Ok(self.load()?.records.into_keys().collect())
    }

    /// Store a record as written by a sync pass
    ///
    /// Sync-owned fields are replaced; the stored lock is kept as is.
    pub fn set_file_record(&self, record: &FileRecord) -> Result<()> {
        let key = journal_key(&record.path);
        self.update(|doc| {
            let lock = doc
                .records
                .get(&key)
                .map(|existing| existing.lock.clone())
                .unwrap_or_default();

            let mut stored = record.clone();
            stored.path = key.clone();
            stored.lock = lock;
            doc.records.insert(key, stored);
        })
    }

    fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut JournalDocument),
    {
        let _lock = JournalLock::acquire(&self.file, self.lock_timeout_ms)?;

        let mut doc = self.load()?;
        f(&mut doc);

        let json = serde_json::to_string_pretty(&doc)?;
        fs_lock::write_atomic(&self.file, json.as_bytes())
    }

    // Caller holds the journal lock.
    fn load(&self) -> Result<JournalDocument> {
        if !self.file.exists() {
            return Ok(JournalDocument::default());
        }

        let content = fs::read_to_string(&self.file)?;
        if content.trim().is_empty() {
            return Ok(JournalDocument::default());
        }
        Ok(serde_json::from_str(&content)?)
    }
}

impl LockRecordStore for SyncJournal {
    fn read(&self, path: &str) -> LockInfo {
        match self.get_file_record(path) {
            Ok(Some(record)) => record.lock.normalized(),
            Ok(None) => LockInfo::unlocked(),
            Err(err) => {
                tracing::warn!(path, error = %err, "failed to read journal record, assuming unlocked");
                LockInfo::unlocked()
            }
        }
    }

    fn write(&self, path: &str, info: &LockInfo) -> Result<()> {
        let key = journal_key(path);
        let info = info.clone().normalized();
        tracing::debug!(path = %key, locked = info.locked, "writing lock state to journal");

        self.update(|doc| {
            doc.records
                .entry(key.clone())
                .or_insert_with(|| FileRecord::new(key.clone()))
                .lock = info;
        })
    }
}

/// Folder-relative journal key for a path
///
/// Backslashes fold to `/` and empty segments are dropped, so `docs\a.odt`, `/docs//a.odt`
/// and `docs/a.odt` name the same record.
pub fn journal_key(path: &str) -> String {
    path_segments(path).join("/")
}

/// Non-empty `/`-separated segments of a path, backslashes folded
pub(crate) fn path_segments(path: &str) -> Vec<String> {
    path.trim()
        .replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}
