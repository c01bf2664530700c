//! Storage engine traits and abstractions.
//!
//! This module defines the seam between the [`Store`](crate::Store) facade and
//! the embedded transactional engine underneath it.

mod bucket;
mod error;
mod traits;

pub use bucket::BucketName;
pub use error::{StoreError, StoreResult};
pub use traits::{StorageEngine, Transaction};
