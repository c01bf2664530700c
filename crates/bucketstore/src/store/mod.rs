//! The bucket-scoped store.
//!
//! A [`Store`] is bound to one database file and one bucket inside it. Every
//! operation runs in exactly one engine transaction and returns synchronously:
//! reads in a read-only snapshot, mutations in a read-write transaction that is
//! committed before the call returns.

mod options;

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use tracing::{debug, debug_span, dispatcher, error, info, Span};

use crate::backends::redb::set_mode;
use crate::backends::RedbEngine;
use crate::engine::{BucketName, StorageEngine, StoreError, StoreResult, Transaction};

pub use options::{StoreConfig, StoreOptions, DEFAULT_EXTENSION};

/// A handle to one bucket of one database file.
///
/// The store owns the engine handle. It is `Send + Sync`; share it across
/// threads by reference or behind an `Arc`. Readers run in parallel and see a
/// frozen snapshot, while writers are serialised by the engine and never wait
/// for readers.
///
/// # Example
///
/// ```no_run
/// use bucketstore::Store;
///
/// let store = Store::open("data", "users")?;
///
/// store.write("ecnepsnai", b"is awesome")?;
/// if let Some(value) = store.get("ecnepsnai")? {
///     assert_eq!(value, b"is awesome");
/// }
///
/// store.for_each(|key, index, value| {
///     println!("{index}: {key:?} = {value:?}");
///     Ok::<_, bucketstore::StoreError>(())
/// })?;
///
/// store.close();
/// # Ok::<(), bucketstore::StoreError>(())
/// ```
pub struct Store {
    name: String,
    path: PathBuf,
    config: StoreConfig,
    /// `None` once the store has been closed. Operations hold a clone of
    /// the handle while they run.
    engine: Mutex<Option<Arc<RedbEngine>>>,
    /// Signalled whenever an operation releases its handle.
    released: Condvar,
    span: Span,
}

impl Store {
    /// Open the store `name` in `data_dir` with default options.
    ///
    /// The backing file is `data_dir/name.db`; the bucket is named `name`.
    ///
    /// # Errors
    ///
    /// See [`Store::open_with_options`].
    pub fn open(data_dir: impl AsRef<Path>, name: &str) -> StoreResult<Self> {
        Self::open_with_options(data_dir, name, StoreOptions::default())
    }

    /// Open the store `name` in `data_dir`.
    ///
    /// Creates the file and the bucket if they don't exist yet. If another
    /// handle holds the file, the open waits up to the configured lock timeout.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidName`] if `name` or an option is unusable
    /// - [`StoreError::Open`] if the file cannot be created or opened
    /// - [`StoreError::LockTimeout`] if the file stays locked
    /// - any engine error raised while creating the bucket
    pub fn open_with_options(
        data_dir: impl AsRef<Path>,
        name: &str,
        options: StoreOptions,
    ) -> StoreResult<Self> {
        let config = options.resolve(name)?;
        let path = data_dir.as_ref().join(config.file_name(name));

        let (span, engine) = dispatcher::with_default(&config.logger, || {
            let span = debug_span!("store", name = %name);
            let engine = span.in_scope(|| open_engine(&path, &config))?;
            Ok::<_, StoreError>((span, engine))
        })?;

        Ok(Self {
            name: name.to_string(),
            path,
            config,
            engine: Mutex::new(Some(Arc::new(engine))),
            released: Condvar::new(),
            span,
        })
    }

    /// The store's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The bucket this store operates on.
    pub fn bucket(&self) -> &BucketName {
        &self.config.bucket
    }

    /// The configuration the store was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Get the value stored under `key`, or `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] after [`Store::close`], or an engine
    /// error if the read fails.
    pub fn get(&self, key: impl AsRef<[u8]>) -> StoreResult<Option<Vec<u8>>> {
        let key = key.as_ref();
        self.with_engine(|engine| {
            debug!(key_len = key.len(), "get");
            let tx = engine.begin_read()?;
            tx.get(self.bucket(), key)
        })
    }

    /// Store `value` under `key`, replacing any existing value.
    ///
    /// The value is durable once this returns `Ok`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot commit; the store is left
    /// unchanged in that case.
    pub fn write(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> StoreResult<()> {
        let (key, value) = (key.as_ref(), value.as_ref());
        self.with_engine(|engine| {
            debug!(key_len = key.len(), value_len = value.len(), "write");
            let mut tx = engine.begin_write()?;
            tx.put(self.bucket(), key, value)?;
            tx.commit()
        })
    }

    /// Delete `key`. Deleting a key that does not exist succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot commit.
    pub fn delete(&self, key: impl AsRef<[u8]>) -> StoreResult<()> {
        let key = key.as_ref();
        self.with_engine(|engine| {
            let mut tx = engine.begin_write()?;
            let existed = tx.delete(self.bucket(), key)?;
            debug!(key_len = key.len(), existed, "delete");
            tx.commit()
        })
    }

    /// Number of keys in the bucket, from a single snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] after [`Store::close`], or an engine
    /// error if the read fails.
    pub fn count(&self) -> StoreResult<usize> {
        self.with_engine(|engine| {
            let tx = engine.begin_read()?;
            let count = tx.len(self.bucket())?;
            debug!(count, "count");
            usize::try_from(count).map_err(StoreError::internal)
        })
    }

    /// Call `f` with every key, its zero-based index and its value, in
    /// ascending byte order of the key.
    ///
    /// The walk runs in one read-only snapshot: writes committed before it
    /// starts are visible, writes committed while it runs are not. If `f`
    /// returns an error the walk stops and that error is returned unchanged.
    ///
    /// `f` may read from this store but must not write to it or close it. The
    /// walk holds a read transaction, and nested write transactions are not
    /// supported.
    ///
    /// # Errors
    ///
    /// Returns the first error returned by `f`, or an engine error converted
    /// into `E`.
    pub fn for_each<E, F>(&self, mut f: F) -> Result<(), E>
    where
        E: From<StoreError>,
        F: FnMut(&[u8], usize, &[u8]) -> Result<(), E>,
    {
        self.with_engine(|engine| {
            debug!("for_each");
            let tx = engine.begin_read()?;
            let mut index = 0;
            tx.for_each(self.bucket(), |key, value| {
                let result = f(key, index, value);
                index += 1;
                result
            })
        })
    }

    /// Remove every key while keeping the bucket.
    ///
    /// The bucket is deleted and recreated inside one write transaction, so
    /// either both steps commit or the old contents stay intact.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot commit.
    pub fn truncate(&self) -> StoreResult<()> {
        self.with_engine(|engine| {
            let mut tx = engine.begin_write()?;
            tx.delete_bucket(self.bucket())?;
            debug!(bucket = %self.bucket(), "deleted bucket");
            tx.create_bucket(self.bucket())?;
            debug!(bucket = %self.bucket(), "created bucket");
            tx.commit()
        })
    }

    /// Stream a consistent copy of the whole database to `writer`.
    ///
    /// The copy is taken from one read-only snapshot, so readers and writers
    /// carry on while it runs. The bytes form a complete database file that
    /// can be opened as a store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the scratch file or `writer` fails, or an
    /// engine error if the snapshot cannot be read.
    pub fn copy_to<W: Write>(&self, mut writer: W) -> StoreResult<()> {
        let scratch_dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let scratch = tempfile::Builder::new().prefix(".copy-").tempdir_in(scratch_dir)?;
        let snapshot = scratch.path().join(self.config.file_name(&self.name));

        self.with_engine(|engine| {
            let entries = snapshot_to(engine, &snapshot, self.config.mode)?;
            debug!(entries, "copy");
            Ok::<_, StoreError>(())
        })?;

        let mut file = File::open(&snapshot)?;
        io::copy(&mut file, &mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Write a consistent copy of the whole database to a new file at `path`.
    ///
    /// The file is created with the store's configured mode. An existing file
    /// is never overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if `path` exists or cannot be created, or an
    /// engine error if the snapshot cannot be copied.
    pub fn backup_to(&self, path: impl AsRef<Path>) -> StoreResult<()> {
        let path = path.as_ref();
        self.with_engine(|engine| {
            let entries = snapshot_to(engine, path, self.config.mode)?;
            info!(entries, dest = %path.display(), "backup written");
            Ok(())
        })
    }

    /// Release the engine handle and the file lock.
    ///
    /// New operations fail with [`StoreError::Closed`] as soon as this is
    /// called; operations already in flight run to completion before the file
    /// is released. Closing twice, or from several threads at once, is safe.
    /// Must not be called from inside a [`Store::for_each`] callback.
    pub fn close(&self) {
        let mut slot = self.lock_slot();
        let Some(engine) = slot.take() else {
            return;
        };
        while Arc::strong_count(&engine) > 1 {
            slot = self.released.wait(slot).unwrap_or_else(PoisonError::into_inner);
        }
        drop(slot);
        drop(engine);

        dispatcher::with_default(&self.config.logger, || {
            self.span.in_scope(|| info!("closed"));
        });
    }

    /// Whether [`Store::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.lock_slot().is_none()
    }

    // The slot only ever holds a whole handle or nothing, so a poisoned lock
    // still guards a consistent state.
    fn lock_slot(&self) -> MutexGuard<'_, Option<Arc<RedbEngine>>> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `op` against the open engine with the store's logger and span.
    ///
    /// `op` runs on a clone of the handle taken under a short lock, so nested
    /// calls from the same thread never wait on `close`, while `close` waits
    /// for `op` to release its clone.
    fn with_engine<T, E>(&self, op: impl FnOnce(&RedbEngine) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        dispatcher::with_default(&self.config.logger, || {
            let _entered = self.span.enter();
            let engine = self.lock_slot().clone().ok_or(StoreError::Closed)?;
            let lease = Lease { store: self, engine: Some(engine) };
            op(lease.engine()?)
        })
    }
}

/// A clone of the engine handle held by one running operation.
///
/// Dropping it wakes a pending [`Store::close`], also when the operation
/// unwinds.
struct Lease<'a> {
    store: &'a Store,
    engine: Option<Arc<RedbEngine>>,
}

impl Lease<'_> {
    fn engine(&self) -> StoreResult<&RedbEngine> {
        self.engine.as_deref().ok_or(StoreError::Closed)
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        // Release under the lock so `close` cannot miss the wakeup
        let _slot = self.store.lock_slot();
        self.engine = None;
        self.store.released.notify_all();
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("bucket", &self.config.bucket)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Open the engine at `path` and make sure the configured bucket exists.
fn open_engine(path: &Path, config: &StoreConfig) -> StoreResult<RedbEngine> {
    debug!(path = %path.display(), "opening");
    let engine = RedbEngine::open_with_config(path, config.engine_config()).map_err(|e| {
        error!(path = %path.display(), error = %e, "error opening store");
        e
    })?;

    ensure_bucket(&engine, &config.bucket).map_err(|e| {
        error!(bucket = %config.bucket, error = %e, "error creating bucket");
        e
    })?;

    debug!("opened");
    Ok(engine)
}

fn ensure_bucket(engine: &RedbEngine, bucket: &BucketName) -> StoreResult<()> {
    let mut tx = engine.begin_write()?;
    if tx.bucket_exists(bucket)? {
        return tx.rollback();
    }
    info!(bucket = %bucket, "creating bucket");
    tx.create_bucket(bucket)?;
    tx.commit()
}

/// Copy one read snapshot of `engine` into a new file at `dest`.
///
/// A partially written destination is removed when the copy fails.
fn snapshot_to(engine: &RedbEngine, dest: &Path, mode: u32) -> StoreResult<u64> {
    let tx = engine.begin_read()?;

    let mut options = OpenOptions::new();
    options.read(true).write(true).create_new(true);
    set_mode(&mut options, mode);
    let file = options.open(dest)?;

    tx.copy_to_file(file).map_err(|e| {
        let _ = fs::remove_file(dest);
        e
    })
}
