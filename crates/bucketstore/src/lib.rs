//! Bucketstore
//!
//! A named, bucket-scoped byte key / byte value store on top of an embedded,
//! single-file transactional engine.
//!
//! # Overview
//!
//! A [`Store`] is bound to one database file (`data_dir/name.db`) and one
//! bucket inside it. It offers point operations ([`Store::get`],
//! [`Store::write`], [`Store::delete`]), bulk operations ([`Store::count`],
//! [`Store::for_each`], [`Store::truncate`]) and hot copies
//! ([`Store::copy_to`], [`Store::backup_to`]) that never block readers or
//! writers. Every operation runs in exactly one engine transaction.
//!
//! # Core Traits
//!
//! - [`StorageEngine`] - Opens read-only and read-write transactions
//! - [`Transaction`] - Bucket operations inside one transaction
//!
//! # Error Handling
//!
//! All fallible operations return [`StoreResult<T>`], an alias for
//! `Result<T, StoreError>`. A missing key is not an error: [`Store::get`]
//! returns `Ok(None)` and [`Store::delete`] succeeds.
//!
//! # Logging
//!
//! Stores log through [`tracing`]. The dispatcher is chosen when the store is
//! opened ([`StoreOptions::logger`]) and every event is emitted inside a
//! `store{name=...}` span, so stores opened with different dispatchers don't
//! see each other's events.
//!
//! # Example
//!
//! ```no_run
//! use bucketstore::{Store, StoreOptions};
//!
//! let store = Store::open_with_options("data", "users", StoreOptions::new().mode(0o600))?;
//!
//! store.write("a", b"1")?;
//! store.write("b", b"2")?;
//! assert_eq!(store.count()?, 2);
//!
//! store.truncate()?;
//! assert_eq!(store.get("a")?, None);
//!
//! store.backup_to("users.backup.db")?;
//! store.close();
//! # Ok::<(), bucketstore::StoreError>(())
//! ```
//!
//! # Modules
//!
//! - [`engine`] - Storage engine traits and abstractions
//! - [`backends`] - Concrete storage backend implementations
//! - [`store`] - The bucket-scoped store facade

pub mod backends;
pub mod engine;
pub mod store;

pub use engine::{BucketName, StorageEngine, StoreError, StoreResult, Transaction};
pub use store::{Store, StoreConfig, StoreOptions};
