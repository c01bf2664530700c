//! Redb storage engine implementation.
//!
//! This module provides the `RedbEngine` type which implements the
//! `StorageEngine` trait using the Redb embedded database.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use redb::{Database, DatabaseError};
use tracing::warn;

use crate::engine::{StorageEngine, StoreError, StoreResult};

use super::transaction::RedbTransaction;

/// How long to wait before retrying a locked database file.
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Default bounded wait for the file lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(1);

/// Default permission bits for newly created database files.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Configuration options for the Redb storage engine.
#[derive(Debug, Clone, Copy)]
pub struct RedbConfig {
    /// Cache size in bytes.
    /// If not set, uses Redb's default.
    pub cache_size: Option<usize>,

    /// How long `open` keeps retrying while another handle holds the file lock.
    pub lock_timeout: Duration,

    /// Permission bits for the database file when it is created.
    /// Ignored on platforms without unix permissions.
    pub file_mode: u32,
}

impl Default for RedbConfig {
    fn default() -> Self {
        Self { cache_size: None, lock_timeout: DEFAULT_LOCK_TIMEOUT, file_mode: DEFAULT_FILE_MODE }
    }
}

impl RedbConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache size.
    #[must_use]
    pub const fn cache_size(mut self, size: usize) -> Self {
        self.cache_size = Some(size);
        self
    }

    /// Set the bounded wait for the file lock.
    #[must_use]
    pub const fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Set the permission bits used when the database file is created.
    #[must_use]
    pub const fn file_mode(mut self, mode: u32) -> Self {
        self.file_mode = mode;
        self
    }
}

/// A storage engine backed by Redb.
///
/// Redb keeps the whole database in one file, gives one writer and any
/// number of snapshot readers, and holds an exclusive lock on the file for as
/// long as the handle lives.
///
/// # Example
///
/// ```ignore
/// use bucketstore::backends::RedbEngine;
///
/// let engine = RedbEngine::open("users.db")?;
///
/// let mut tx = engine.begin_write()?;
/// tx.create_bucket(&bucket)?;
/// tx.put(&bucket, b"user:1", b"Alice")?;
/// tx.commit()?;
/// ```
pub struct RedbEngine {
    /// The underlying Redb database.
    db: Database,
}

impl RedbEngine {
    /// Open or create a database at the given path with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Open`] if the database cannot be opened or created,
    /// or [`StoreError::LockTimeout`] if the file stays locked.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with_config(path, RedbConfig::default())
    }

    /// Open or create a database at the given path with custom configuration.
    ///
    /// While another handle holds the file lock the open is retried until
    /// `config.lock_timeout` has elapsed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Open`] if the database cannot be opened or created,
    /// or [`StoreError::LockTimeout`] if the file stays locked.
    pub fn open_with_config(path: impl AsRef<Path>, config: RedbConfig) -> StoreResult<Self> {
        let path = path.as_ref();
        create_with_mode(path, config.file_mode)
            .map_err(|e| StoreError::Open(format!("{}: {e}", path.display())))?;

        let mut builder = Database::builder();
        if let Some(cache_size) = config.cache_size {
            builder.set_cache_size(cache_size);
        }

        let started = Instant::now();
        let mut contended = false;
        let db = loop {
            match builder.create(path) {
                Ok(db) => break db,
                Err(DatabaseError::DatabaseAlreadyOpen) => {
                    if started.elapsed() >= config.lock_timeout {
                        return Err(StoreError::LockTimeout {
                            path: path.to_path_buf(),
                            timeout: config.lock_timeout,
                        });
                    }
                    if !contended {
                        warn!(path = %path.display(), "database file is locked, waiting");
                        contended = true;
                    }
                    thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(e) => return Err(StoreError::Open(format!("{}: {e}", path.display()))),
            }
        };

        Ok(Self { db })
    }

    /// Create an in-memory database for testing.
    ///
    /// The database will be lost when the engine is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Open`] if the database cannot be created.
    pub fn in_memory() -> StoreResult<Self> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .map_err(|e| StoreError::Open(e.to_string()))?;

        Ok(Self { db })
    }

    /// Get the underlying Redb database.
    ///
    /// This is primarily for advanced use cases and testing.
    pub const fn inner(&self) -> &Database {
        &self.db
    }
}

impl StorageEngine for RedbEngine {
    type Transaction<'a> = RedbTransaction;

    fn begin_read(&self) -> StoreResult<Self::Transaction<'_>> {
        let tx = self.db.begin_read().map_err(StoreError::transaction)?;
        Ok(RedbTransaction::new_read(tx))
    }

    fn begin_write(&self) -> StoreResult<Self::Transaction<'_>> {
        let tx = self.db.begin_write().map_err(StoreError::transaction)?;
        Ok(RedbTransaction::new_write(tx))
    }
}

/// Create `path` with `mode` if it does not exist yet. Redb initialises an
/// empty file in place, so the permissions set here stick.
fn create_with_mode(path: &Path, mode: u32) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.read(true).write(true).create_new(true);
    set_mode(&mut options, mode);

    match options.open(path) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

/// Apply unix permission bits to files created through `options`.
#[cfg(unix)]
pub(crate) fn set_mode(options: &mut OpenOptions, mode: u32) {
    use std::os::unix::fs::OpenOptionsExt;
    options.mode(mode);
}

#[cfg(not(unix))]
pub(crate) fn set_mode(_options: &mut OpenOptions, _mode: u32) {}
