//! Core storage engine traits.
//!
//! This module defines the primitives a backend has to offer:
//!
//! - [`StorageEngine`] - Opens read-only and read-write transactions
//! - [`Transaction`] - Bucket-scoped key-value operations inside one transaction
//!
//! Any embedded engine with single-writer / multi-reader transactions, snapshot
//! isolation, named buckets and a consistent whole-database copy can implement
//! these traits.

use std::fs::File;
use std::sync::Arc;

use super::{BucketName, StoreError, StoreResult};

/// A storage engine that provides transactional key-value operations.
///
/// Implementations must be thread-safe (`Send + Sync`). Any number of read
/// transactions may run in parallel; at most one write transaction is active
/// at a time, and it neither blocks nor is blocked by readers.
///
/// # Example
///
/// ```ignore
/// use bucketstore::{BucketName, StorageEngine, Transaction};
///
/// fn example<E: StorageEngine>(engine: &E) -> StoreResult<()> {
///     let bucket = BucketName::new("users")?;
///
///     let mut tx = engine.begin_write()?;
///     tx.create_bucket(&bucket)?;
///     tx.put(&bucket, b"key", b"value")?;
///     tx.commit()?;
///
///     let tx = engine.begin_read()?;
///     let value = tx.get(&bucket, b"key")?;
///     Ok(())
/// }
/// ```
pub trait StorageEngine: Send + Sync {
    /// The transaction type for this engine.
    type Transaction<'a>: Transaction
    where
        Self: 'a;

    /// Begin a read-only transaction.
    ///
    /// The transaction sees a snapshot frozen at the moment it starts.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Transaction`] if the transaction cannot be started.
    fn begin_read(&self) -> StoreResult<Self::Transaction<'_>>;

    /// Begin a read-write transaction.
    ///
    /// Blocks while another write transaction is active.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Transaction`] if the transaction cannot be started.
    fn begin_write(&self) -> StoreResult<Self::Transaction<'_>>;
}

/// A transaction that provides ACID, bucket-scoped key-value operations.
///
/// Write transactions must be explicitly committed; dropping one without
/// committing rolls back every change made through it.
pub trait Transaction {
    /// Check whether a bucket exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot list its buckets.
    fn bucket_exists(&self, bucket: &BucketName) -> StoreResult<bool>;

    /// Create a bucket. Creating a bucket that already exists is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ReadOnly`] in a read-only transaction.
    fn create_bucket(&mut self, bucket: &BucketName) -> StoreResult<()>;

    /// Delete a bucket and everything in it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::BucketNotFound`] if the bucket does not exist, or
    /// [`StoreError::ReadOnly`] in a read-only transaction.
    fn delete_bucket(&mut self, bucket: &BucketName) -> StoreResult<()>;

    /// Get the value stored under `key`.
    ///
    /// Returns `Ok(None)` if the key does not exist. Empty values are returned
    /// as `Ok(Some(vec![]))`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::BucketNotFound`] if the bucket doesn't exist.
    fn get(&self, bucket: &BucketName, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Insert or replace the value stored under `key`.
    ///
    /// Depending on the backend, the bucket may be created if it is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails or if this is a read-only transaction.
    fn put(&mut self, bucket: &BucketName, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Delete `key` from the bucket.
    ///
    /// Returns `Ok(true)` if the key was deleted, `Ok(false)` if it didn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails or if this is a read-only transaction.
    fn delete(&mut self, bucket: &BucketName, key: &[u8]) -> StoreResult<bool>;

    /// Number of keys in the bucket.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::BucketNotFound`] if the bucket doesn't exist.
    fn len(&self, bucket: &BucketName) -> StoreResult<u64>;

    /// Visit every entry of the bucket in ascending byte order of the key.
    ///
    /// The walk stops at the first error returned by `f`, and that error is
    /// returned unchanged. Engine errors are converted into `E`.
    ///
    /// # Errors
    ///
    /// Returns the callback's error, or an engine error converted into `E`.
    fn for_each<E, F>(&self, bucket: &BucketName, f: F) -> Result<(), E>
    where
        E: From<StoreError>,
        F: FnMut(&[u8], &[u8]) -> Result<(), E>;

    /// Write a complete database image of this transaction's snapshot into
    /// `file`, which must be empty and opened for reading and writing.
    ///
    /// Returns the number of entries copied across all buckets.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unsupported`] if the transaction cannot provide a
    /// frozen snapshot, or an I/O or engine error if the copy fails.
    fn copy_to_file(&self, file: File) -> StoreResult<u64>;

    /// Commit the transaction, making all changes durable.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Transaction`] if the commit fails. The database is
    /// left as it was before the transaction started.
    fn commit(self) -> StoreResult<()>;

    /// Rollback the transaction, discarding all changes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Transaction`] if the rollback fails.
    fn rollback(self) -> StoreResult<()>;

    /// Check if this is a read-only transaction.
    fn is_read_only(&self) -> bool;
}

/// Implement `StorageEngine` for `Arc<E>` so an engine can be shared.
impl<E: StorageEngine> StorageEngine for Arc<E> {
    type Transaction<'a>
        = E::Transaction<'a>
    where
        Self: 'a;

    fn begin_read(&self) -> StoreResult<Self::Transaction<'_>> {
        (**self).begin_read()
    }

    fn begin_write(&self) -> StoreResult<Self::Transaction<'_>> {
        (**self).begin_write()
    }
}
