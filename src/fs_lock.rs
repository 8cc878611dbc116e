//! Advisory file locking and atomic writes for the sync journal
//!
//! Every journal mutation runs under an exclusive `flock` (via fs2) on a
//! sibling `<file>.lock` and replaces the document with temp file + rename,
//! so a lock write and a sync pass touching the same record never interleave
//! and readers never observe a partial document.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{Error, Result};

/// Default time to wait for the journal lock, in milliseconds
pub const DEFAULT_JOURNAL_LOCK_TIMEOUT_MS: u64 = 5000;

const RETRY_INTERVAL_MS: u64 = 20;

fn is_contended(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }

    // Windows surfaces sharing/lock violations as raw OS errors 32/33.
    #[cfg(windows)]
    {
        matches!(err.raw_os_error(), Some(32) | Some(33))
    }
    #[cfg(not(windows))]
    {
        false
    }
}

/// Path of the lock file guarding `path`
pub fn lock_path_for(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.lock", path.display()))
}

/// Exclusive lock on a journal file, released on drop
#[derive(Debug)]
pub struct JournalLock {
    file: File,
    path: PathBuf,
}

impl JournalLock {
    /// Acquire the lock guarding `target`, waiting up to `timeout_ms`
    pub fn acquire(target: impl AsRef<Path>, timeout_ms: u64) -> Result<Self> {
        let path = lock_path_for(target.as_ref());
        let file = open_lock_file(&path)?;

        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(JournalLock { file, path }),
                Err(e) if is_contended(&e) => {
                    if Instant::now() >= deadline {
                        return Err(Error::JournalLocked(path));
                    }
                    std::thread::sleep(Duration::from_millis(RETRY_INTERVAL_MS));
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    /// Try once; `Ok(None)` when another holder has it
    pub fn try_acquire(target: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = lock_path_for(target.as_ref());
        let file = open_lock_file(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(JournalLock { file, path })),
            Err(e) if is_contended(&e) => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for JournalLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    Ok(OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?)
}

/// Replace `path` with `data` via a temp file in the same directory
///
/// Does not lock; callers hold a `JournalLock` when other writers exist.
pub fn write_atomic(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension(format!("tmp.{}", std::process::id()));

    let mut temp_file = File::create(&temp_path)?;
    temp_file.write_all(data)?;
    temp_file.sync_all()?;
    drop(temp_file);

    fs::rename(&temp_path, path)?;

    Ok(())
}
