//! Bucket namespace identifiers.

use std::fmt;

use super::{StoreError, StoreResult};

/// The name of a bucket: an independent, key-ordered namespace inside one
/// database file.
///
/// A bucket name is an opaque identifier. It is fixed when a store is opened
/// and is never renamed. Engine handles for the bucket are only valid for the
/// transaction that produced them; the name is what outlives them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketName(String);

impl BucketName {
    /// Create a bucket name, rejecting the empty string.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] if `name` is empty.
    pub fn new(name: impl Into<String>) -> StoreResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(StoreError::InvalidName("bucket name must not be empty".into()));
        }
        Ok(Self(name))
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name as raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for BucketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BucketName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
