//! Redb transaction implementation.
//!
//! This module provides the `RedbTransaction` type which implements the
//! `Transaction` trait for both read-only and read-write transactions.
//!
//! Bucket handles (redb tables) are opened per call and dropped before the
//! call returns; nothing outlives the transaction that opened it.

use std::fs::File;

use redb::{Database, ReadTransaction, TableError, TableHandle, WriteTransaction};

use crate::engine::{BucketName, StoreError, StoreResult, Transaction};

use super::tables::{bucket_table, entry_count, named_table, read_value, walk};

/// A transaction for the Redb storage engine.
///
/// This type wraps both read-only and read-write Redb transactions,
/// providing a unified interface through the `Transaction` trait.
#[allow(clippy::large_enum_variant)]
pub enum RedbTransaction {
    /// A read-only transaction.
    Read(ReadTransaction),
    /// A read-write transaction.
    Write(WriteTransaction),
}

impl RedbTransaction {
    /// Create a new read-only transaction.
    pub const fn new_read(tx: ReadTransaction) -> Self {
        Self::Read(tx)
    }

    /// Create a new read-write transaction.
    pub const fn new_write(tx: WriteTransaction) -> Self {
        Self::Write(tx)
    }
}

/// Map a table-open failure for `bucket` onto the store's error taxonomy.
fn open_error(bucket: &BucketName, err: TableError) -> StoreError {
    match err {
        TableError::TableDoesNotExist(_) => StoreError::BucketNotFound(bucket.to_string()),
        other => StoreError::internal(other),
    }
}

impl Transaction for RedbTransaction {
    fn bucket_exists(&self, bucket: &BucketName) -> StoreResult<bool> {
        let found = match self {
            Self::Read(tx) => tx
                .list_tables()
                .map_err(StoreError::internal)?
                .any(|table| table.name() == bucket.as_str()),
            Self::Write(tx) => tx
                .list_tables()
                .map_err(StoreError::internal)?
                .any(|table| table.name() == bucket.as_str()),
        };
        Ok(found)
    }

    fn create_bucket(&mut self, bucket: &BucketName) -> StoreResult<()> {
        match self {
            Self::Read(_) => Err(StoreError::ReadOnly),
            Self::Write(tx) => {
                // Opening a table in a write transaction creates it.
                tx.open_table(bucket_table(bucket)).map_err(|e| open_error(bucket, e))?;
                Ok(())
            }
        }
    }

    fn delete_bucket(&mut self, bucket: &BucketName) -> StoreResult<()> {
        match self {
            Self::Read(_) => Err(StoreError::ReadOnly),
            Self::Write(tx) => match tx.delete_table(bucket_table(bucket)) {
                Ok(true) => Ok(()),
                Ok(false) => Err(StoreError::BucketNotFound(bucket.to_string())),
                Err(e) => Err(open_error(bucket, e)),
            },
        }
    }

    fn get(&self, bucket: &BucketName, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        match self {
            Self::Read(tx) => {
                let table =
                    tx.open_table(bucket_table(bucket)).map_err(|e| open_error(bucket, e))?;
                read_value(&table, key)
            }
            Self::Write(tx) => {
                let table =
                    tx.open_table(bucket_table(bucket)).map_err(|e| open_error(bucket, e))?;
                read_value(&table, key)
            }
        }
    }

    fn put(&mut self, bucket: &BucketName, key: &[u8], value: &[u8]) -> StoreResult<()> {
        match self {
            Self::Read(_) => Err(StoreError::ReadOnly),
            Self::Write(tx) => {
                let mut table =
                    tx.open_table(bucket_table(bucket)).map_err(|e| open_error(bucket, e))?;
                table.insert(key, value).map_err(StoreError::internal)?;
                Ok(())
            }
        }
    }

    fn delete(&mut self, bucket: &BucketName, key: &[u8]) -> StoreResult<bool> {
        match self {
            Self::Read(_) => Err(StoreError::ReadOnly),
            Self::Write(tx) => {
                let mut table =
                    tx.open_table(bucket_table(bucket)).map_err(|e| open_error(bucket, e))?;
                let removed = table.remove(key).map_err(StoreError::internal)?;
                Ok(removed.is_some())
            }
        }
    }

    fn len(&self, bucket: &BucketName) -> StoreResult<u64> {
        match self {
            Self::Read(tx) => {
                let table =
                    tx.open_table(bucket_table(bucket)).map_err(|e| open_error(bucket, e))?;
                entry_count(&table)
            }
            Self::Write(tx) => {
                let table =
                    tx.open_table(bucket_table(bucket)).map_err(|e| open_error(bucket, e))?;
                entry_count(&table)
            }
        }
    }

    fn for_each<E, F>(&self, bucket: &BucketName, f: F) -> Result<(), E>
    where
        E: From<StoreError>,
        F: FnMut(&[u8], &[u8]) -> Result<(), E>,
    {
        match self {
            Self::Read(tx) => {
                let table =
                    tx.open_table(bucket_table(bucket)).map_err(|e| open_error(bucket, e))?;
                walk(&table, f)
            }
            Self::Write(tx) => {
                let table =
                    tx.open_table(bucket_table(bucket)).map_err(|e| open_error(bucket, e))?;
                walk(&table, f)
            }
        }
    }

    fn copy_to_file(&self, file: File) -> StoreResult<u64> {
        match self {
            Self::Read(tx) => copy_snapshot(tx, file),
            Self::Write(_) => Err(StoreError::Unsupported(
                "snapshot copy requires a read-only transaction".into(),
            )),
        }
    }

    fn commit(self) -> StoreResult<()> {
        match self {
            // Read transactions don't need explicit commit
            Self::Read(_) => Ok(()),
            Self::Write(tx) => tx.commit().map_err(StoreError::transaction),
        }
    }

    fn rollback(self) -> StoreResult<()> {
        match self {
            Self::Read(_) => Ok(()),
            Self::Write(tx) => tx.abort().map_err(StoreError::transaction),
        }
    }

    fn is_read_only(&self) -> bool {
        matches!(self, Self::Read(_))
    }
}

/// Replay every table visible in `snapshot` into a fresh database in `file`.
///
/// The source is a read transaction, so concurrent writers keep committing
/// while the copy runs and none of their changes reach the target.
fn copy_snapshot(snapshot: &ReadTransaction, file: File) -> StoreResult<u64> {
    let target =
        Database::builder().create_file(file).map_err(|e| StoreError::Open(e.to_string()))?;
    let out = target.begin_write().map_err(StoreError::transaction)?;

    let mut copied = 0u64;
    for handle in snapshot.list_tables().map_err(StoreError::internal)? {
        let name = handle.name().to_string();
        let source = snapshot.open_table(named_table(&name)).map_err(|e| match e {
            TableError::TableTypeMismatch { .. } => {
                StoreError::Unsupported(format!("table {name} does not hold raw byte entries"))
            }
            other => StoreError::internal(other),
        })?;
        let mut dest = out.open_table(named_table(&name)).map_err(StoreError::internal)?;
        walk(&source, |key, value| -> StoreResult<()> {
            dest.insert(key, value).map_err(StoreError::internal)?;
            copied += 1;
            Ok(())
        })?;
    }

    out.commit().map_err(StoreError::transaction)?;
    Ok(copied)
}
