//! Redb storage backend.
//!
//! This module provides a storage backend implementation using Redb,
//! a pure-Rust embedded database. Each bucket maps onto one redb table of
//! raw byte keys and values.
//!
//! # Features
//!
//! - **Single file**: the whole database lives in one file, locked exclusively
//!   by the process that opened it
//! - **MVCC**: one writer and any number of snapshot readers, neither blocking
//!   the other
//! - **Durable commit**: a committed write transaction survives a crash; an
//!   uncommitted one leaves no trace
//!
//! # Configuration
//!
//! ```ignore
//! use std::time::Duration;
//! use bucketstore::backends::{RedbConfig, RedbEngine};
//!
//! let config = RedbConfig::new()
//!     .lock_timeout(Duration::from_secs(5))
//!     .file_mode(0o600);
//!
//! let engine = RedbEngine::open_with_config("users.db", config)?;
//! ```
//!
//! # In-Memory Databases
//!
//! For testing, you can create an in-memory database that doesn't persist:
//!
//! ```ignore
//! let engine = RedbEngine::in_memory()?;
//! ```

mod engine;
pub mod tables;
mod transaction;

pub(crate) use engine::set_mode;
pub use engine::{RedbConfig, RedbEngine, DEFAULT_FILE_MODE, DEFAULT_LOCK_TIMEOUT};
pub use transaction::RedbTransaction;
