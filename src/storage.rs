//! Crash-safe file writes with rotating backups.
//!
//! A write goes to a temporary file in the target's own directory, is
//! flushed to disk, and is then renamed over the target. The rename is the
//! commit point: until it happens the target keeps its previous complete
//! contents. On Windows a failed rename falls back to copy + remove, which
//! is best effort rather than atomic.
//!
//! Backups are named `<file>.<UTC timestamp>-<seq>.bak` next to the target,
//! so lexical order of the names is chronological order.

use crate::error::{Error, Result, ValidationError};
use chrono::Utc;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Default number of backups kept per file.
pub const DEFAULT_BACKUP_RETENTION: usize = 5;

const BACKUP_SUFFIX: &str = ".bak";
const TEMP_SUFFIX: &str = ".tmp";

/// Bounded exponential backoff for transient filesystem errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 25,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
        }
    }

    /// Run `f`, retrying transient failures with doubling delays.
    ///
    /// Non-transient errors fail immediately. After the last attempt the
    /// final underlying error is returned inside [`Error::FileOperation`].
    pub fn run<T, F>(&self, op: &'static str, path: &Path, mut f: F) -> Result<T>
    where
        F: FnMut() -> io::Result<T>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match f() {
                Ok(value) => return Ok(value),
                Err(err) if attempt < max_attempts && is_transient(&err) => {
                    let delay = self.delay_for(attempt);
                    log::warn!(
                        "{op} on {} failed (attempt {attempt}/{max_attempts}): {err}; retrying in {delay:?}",
                        path.display()
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(source) => {
                    return Err(Error::FileOperation {
                        op,
                        path: path.to_path_buf(),
                        attempts: attempt,
                        source,
                    });
                }
            }
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay_ms.saturating_mul(1 << (attempt - 1).min(16));
        let jitter = if self.base_delay_ms > 1 {
            rand::rng().random_range(0..=self.base_delay_ms / 2)
        } else {
            0
        };
        Duration::from_millis(base.saturating_add(jitter))
    }
}

/// Errors worth retrying: the resource may be free on the next attempt.
fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
            | io::ErrorKind::ResourceBusy
    )
}

/// Per-write options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Copy the previous file to a timestamped backup before replacing it.
    pub create_backup: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self { create_backup: true }
    }
}

/// Durable single-file writer.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    retention: usize,
    retry: RetryPolicy,
}

impl Default for AtomicFileWriter {
    fn default() -> Self {
        Self::new(DEFAULT_BACKUP_RETENTION, RetryPolicy::default())
    }
}

impl AtomicFileWriter {
    pub fn new(retention: usize, retry: RetryPolicy) -> Self {
        Self { retention, retry }
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    // =========================================================================
    // Writing
    // =========================================================================

    /// Atomically replace `path` with `content`. An empty string is rejected.
    pub fn write(&self, path: &Path, content: &str, options: WriteOptions) -> Result<()> {
        if content.is_empty() {
            return Err(ValidationError::EmptyContent.into());
        }
        self.write_with(path, content.as_bytes(), options, commit_rename)
    }

    /// Serialize `value` as pretty JSON and write it atomically.
    pub fn write_json<T: Serialize>(&self, path: &Path, value: &T, options: WriteOptions) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        self.write(path, &json, options)
    }

    /// The write pipeline, with the commit step supplied by the caller.
    fn write_with<C>(&self, path: &Path, data: &[u8], options: WriteOptions, mut commit: C) -> Result<()>
    where
        C: FnMut(&Path, &Path) -> io::Result<()>,
    {
        let dir = parent_dir(path);
        self.ensure_dir(&dir)?;

        let temp_path = temp_path_for(path);
        let staged = self.retry.run("write temp file", &temp_path, || {
            let mut file = File::create(&temp_path)?;
            file.write_all(data)?;
            file.sync_all()
        });
        if let Err(err) = staged {
            remove_quietly(&temp_path);
            return Err(err);
        }

        let backed_up = if options.create_backup && path.exists() {
            match self.backup(path) {
                Ok(backup) => Some(backup),
                Err(err) => {
                    remove_quietly(&temp_path);
                    return Err(err);
                }
            }
        } else {
            None
        };

        if let Err(err) = self.retry.run("rename", path, || commit(&temp_path, path)) {
            remove_quietly(&temp_path);
            return Err(err);
        }

        if let Some(backup) = backed_up {
            log::info!("backed up {} to {}", path.display(), backup.display());
            // The new content is already committed; stale backups are not fatal.
            if let Err(err) = self.rotate_backups(path) {
                log::warn!("backup rotation for {} failed: {err}", path.display());
            }
        }
        log::debug!("wrote {} ({} bytes)", path.display(), data.len());
        Ok(())
    }

    // =========================================================================
    // Backups
    // =========================================================================

    fn backup(&self, path: &Path) -> Result<PathBuf> {
        let backup = next_backup_path(path);
        self.retry.run("backup", &backup, || fs::copy(path, &backup))?;
        Ok(backup)
    }

    /// Existing backups of `path`, oldest first.
    pub fn list_backups(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let dir = parent_dir(path);
        let prefix = backup_prefix(path);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(Error::file("list backups", dir, err)),
        };

        let mut backups = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::file("list backups", &dir, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with(&prefix) && name.ends_with(BACKUP_SUFFIX) {
                backups.push(entry.path());
            }
        }
        backups.sort();
        Ok(backups)
    }

    /// Delete the oldest backups beyond the retention limit. Returns what was deleted.
    pub fn rotate_backups(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let backups = self.list_backups(path)?;
        let excess = backups.len().saturating_sub(self.retention);
        let mut removed = Vec::with_capacity(excess);
        for old in backups.into_iter().take(excess) {
            self.delete(&old)?;
            log::debug!("rotated out backup {}", old.display());
            removed.push(old);
        }
        Ok(removed)
    }

    // =========================================================================
    // Supporting primitives
    // =========================================================================

    pub fn read(&self, path: &Path) -> Result<String> {
        self.retry.run("read", path, || fs::read_to_string(path))
    }

    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let content = self.read(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    /// Remove a file. Already absent is not an error.
    pub fn delete(&self, path: &Path) -> Result<()> {
        self.retry.run("delete", path, || match fs::remove_file(path) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        })
    }

    /// Create a directory and its parents. Already present is not an error.
    pub fn ensure_dir(&self, dir: &Path) -> Result<()> {
        self.retry.run("create directory", dir, || fs::create_dir_all(dir))
    }
}

fn commit_rename(temp: &Path, target: &Path) -> io::Result<()> {
    match fs::rename(temp, target) {
        Ok(()) => Ok(()),
        #[cfg(windows)]
        Err(_) => {
            fs::copy(temp, target)?;
            fs::remove_file(temp)
        }
        #[cfg(not(windows))]
        Err(err) => Err(err),
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let unique: u32 = rand::random();
    parent_dir(path).join(format!(
        ".{}.{}.{unique:08x}{TEMP_SUFFIX}",
        file_name(path),
        std::process::id()
    ))
}

fn backup_prefix(path: &Path) -> String {
    format!("{}.", file_name(path))
}

fn next_backup_path(path: &Path) -> PathBuf {
    let dir = parent_dir(path);
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%.9fZ");
    let prefix = backup_prefix(path);
    (0u32..)
        .map(|seq| dir.join(format!("{prefix}{stamp}-{seq:03}{BACKUP_SUFFIX}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| dir.join(format!("{prefix}{stamp}{BACKUP_SUFFIX}")))
}

/// Best-effort cleanup of a temp file on an error path; the original error wins.
fn remove_quietly(path: &Path) {
    if let Err(err) = fs::remove_file(path)
        && err.kind() != io::ErrorKind::NotFound
    {
        log::warn!("could not remove temp file {}: {err}", path.display());
    }
}
