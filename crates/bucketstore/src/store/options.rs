//! Store configuration.

use std::time::Duration;

use tracing::Dispatch;

use crate::backends::redb::{RedbConfig, DEFAULT_FILE_MODE, DEFAULT_LOCK_TIMEOUT};
use crate::engine::{BucketName, StoreError, StoreResult};

/// File suffix used when no extension is configured.
pub const DEFAULT_EXTENSION: &str = ".db";

/// Options recognised when opening a [`Store`](super::Store).
///
/// Every option is optional. An unset option, or one set to its zero value
/// (mode `0`, an empty string, a zero timeout), keeps the default.
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Permission bits for the backing file and for backup files.
    pub mode: Option<u32>,
    /// Suffix appended to the store name to form the file name.
    pub extension: Option<String>,
    /// Bucket to operate on instead of the one named after the store.
    pub bucket_name: Option<String>,
    /// Bounded wait for the file lock while opening.
    pub lock_timeout: Option<Duration>,
    /// Engine page cache size in bytes.
    pub cache_size: Option<usize>,
    /// Where the store's log events go. Defaults to the dispatcher that is
    /// current when the store is opened.
    pub logger: Option<Dispatch>,
}

impl StoreOptions {
    /// Create options with every field unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the file permission bits.
    #[must_use]
    pub const fn mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Set the file extension, including the leading dot.
    #[must_use]
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Set the bucket name.
    #[must_use]
    pub fn bucket_name(mut self, bucket_name: impl Into<String>) -> Self {
        self.bucket_name = Some(bucket_name.into());
        self
    }

    /// Set the bounded wait for the file lock.
    #[must_use]
    pub const fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    /// Set the engine cache size.
    #[must_use]
    pub const fn cache_size(mut self, size: usize) -> Self {
        self.cache_size = Some(size);
        self
    }

    /// Route the store's log events to `logger`.
    #[must_use]
    pub fn logger(mut self, logger: Dispatch) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Resolve these options against the defaults for a store called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] if `name` cannot be used as a file
    /// name, or if the extension contains a path separator.
    pub fn resolve(self, name: &str) -> StoreResult<StoreConfig> {
        validate_name(name)?;

        let extension = non_empty(self.extension).unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
        if extension.contains(['/', '\\']) {
            return Err(StoreError::InvalidName(format!(
                "extension {extension:?} contains a path separator"
            )));
        }

        let bucket = BucketName::new(non_empty(self.bucket_name).unwrap_or_else(|| name.to_string()))?;

        Ok(StoreConfig {
            mode: self.mode.filter(|&mode| mode != 0).unwrap_or(DEFAULT_FILE_MODE),
            extension,
            bucket,
            lock_timeout: self
                .lock_timeout
                .filter(|timeout| !timeout.is_zero())
                .unwrap_or(DEFAULT_LOCK_TIMEOUT),
            cache_size: self.cache_size.filter(|&size| size != 0),
            logger: self.logger.unwrap_or_else(|| tracing::dispatcher::get_default(Dispatch::clone)),
        })
    }
}

/// The resolved, immutable configuration of an open store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Permission bits for the backing file and for backup files.
    pub mode: u32,
    /// File name suffix.
    pub extension: String,
    /// The single bucket this store operates on.
    pub bucket: BucketName,
    /// Bounded wait for the file lock while opening.
    pub lock_timeout: Duration,
    /// Engine page cache size in bytes, if overridden.
    pub cache_size: Option<usize>,
    /// Dispatcher that receives the store's log events.
    pub logger: Dispatch,
}

impl StoreConfig {
    /// The backing file name for a store called `name`.
    pub fn file_name(&self, name: &str) -> String {
        format!("{name}{}", self.extension)
    }

    /// The engine configuration derived from these options.
    pub fn engine_config(&self) -> RedbConfig {
        let config = RedbConfig::new().lock_timeout(self.lock_timeout).file_mode(self.mode);
        match self.cache_size {
            Some(size) => config.cache_size(size),
            None => config,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Store names become file names inside the data directory, so they must not
/// be able to point anywhere else.
fn validate_name(name: &str) -> StoreResult<()> {
    if name.is_empty() {
        return Err(StoreError::InvalidName("store name must not be empty".into()));
    }
    if name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(StoreError::InvalidName(format!("{name:?} is not a plain file name")));
    }
    Ok(())
}
