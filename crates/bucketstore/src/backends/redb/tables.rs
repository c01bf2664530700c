//! Redb table definitions for buckets.
//!
//! Every bucket is its own physical redb table keyed and valued by raw bytes,
//! so redb's byte-wise key order is the bucket's iteration order.

use redb::{ReadableTable, ReadableTableMetadata, TableDefinition};

use crate::engine::{BucketName, StoreError, StoreResult};

/// The table definition type used for every bucket.
pub type BucketTable<'a> = TableDefinition<'a, &'static [u8], &'static [u8]>;

/// The table definition for a bucket.
///
/// The definition borrows the name; it is a handle for one `open_table` call
/// and is never stored.
pub fn bucket_table(bucket: &BucketName) -> BucketTable<'_> {
    TableDefinition::new(bucket.as_str())
}

/// The table definition for a table found by name while listing a database.
pub fn named_table(name: &str) -> BucketTable<'_> {
    TableDefinition::new(name)
}

/// Read one value out of an open table.
pub fn read_value<T>(table: &T, key: &[u8]) -> StoreResult<Option<Vec<u8>>>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    Ok(table.get(key).map_err(StoreError::internal)?.map(|value| value.value().to_vec()))
}

/// Number of entries in an open table.
pub fn entry_count<T: ReadableTableMetadata>(table: &T) -> StoreResult<u64> {
    table.len().map_err(StoreError::internal)
}

/// Walk an open table in key order, stopping at the first callback error.
pub fn walk<T, E, F>(table: &T, mut f: F) -> Result<(), E>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
    E: From<StoreError>,
    F: FnMut(&[u8], &[u8]) -> Result<(), E>,
{
    for entry in table.iter().map_err(StoreError::internal)? {
        let (key, value) = entry.map_err(StoreError::internal)?;
        f(key.value(), value.value())?;
    }
    Ok(())
}
