//! Tests for storage engine traits.
//!
//! These tests validate the trait contracts and can be used to test
//! any storage engine implementation.

use bucketstore::{BucketName, StorageEngine, StoreError, StoreResult, Transaction};

/// A test harness trait for testing storage engine implementations.
///
/// Implementors provide a way to create and clean up test databases.
pub trait TestHarness {
    /// The storage engine type being tested.
    type Engine: StorageEngine;

    /// Create a new storage engine for testing.
    fn create_engine() -> StoreResult<Self::Engine>;

    /// Clean up after tests (remove temp files, etc.).
    fn cleanup(_engine: Self::Engine) {}
}

/// Run the standard test suite against a storage engine.
///
/// # Example
///
/// ```ignore
/// struct RedbHarness;
///
/// impl TestHarness for RedbHarness {
///     type Engine = RedbEngine;
///
///     fn create_engine() -> StoreResult<Self::Engine> {
///         RedbEngine::in_memory()
///     }
/// }
///
/// #[test]
/// fn test_redb_compliance() {
///     run_test_suite::<RedbHarness>();
/// }
/// ```
pub fn run_test_suite<H: TestHarness>() {
    test_bucket_lifecycle::<H>();
    test_basic_operations::<H>();
    test_empty_keys_and_values::<H>();
    test_snapshot_isolation::<H>();
    test_iteration_order::<H>();
    test_iteration_stops_on_error::<H>();
    test_delete_bucket_is_atomic::<H>();
    test_missing_bucket::<H>();
    test_read_only_enforcement::<H>();
}

fn bucket() -> BucketName {
    BucketName::new("test_bucket").expect("valid bucket name")
}

/// Create the test bucket and fill it with `entries` in one transaction.
fn seed<E: StorageEngine>(engine: &E, entries: &[(&[u8], &[u8])]) {
    let bucket = bucket();
    let mut tx = engine.begin_write().expect("failed to begin write");
    tx.create_bucket(&bucket).expect("failed to create bucket");
    for (key, value) in entries {
        tx.put(&bucket, key, value).expect("failed to put");
    }
    tx.commit().expect("failed to commit");
}

/// Test creating, re-creating and deleting a bucket.
fn test_bucket_lifecycle<H: TestHarness>() {
    let engine = H::create_engine().expect("failed to create engine");
    let bucket = bucket();

    {
        let tx = engine.begin_read().expect("failed to begin read");
        assert!(!tx.bucket_exists(&bucket).expect("failed to check bucket"));
    }

    {
        let mut tx = engine.begin_write().expect("failed to begin write");
        tx.create_bucket(&bucket).expect("failed to create bucket");
        tx.put(&bucket, b"key", b"value").expect("failed to put");
        tx.commit().expect("failed to commit");
    }

    // Creating an existing bucket keeps its contents
    {
        let mut tx = engine.begin_write().expect("failed to begin write");
        tx.create_bucket(&bucket).expect("failed to create bucket again");
        tx.commit().expect("failed to commit");
    }

    {
        let tx = engine.begin_read().expect("failed to begin read");
        assert!(tx.bucket_exists(&bucket).expect("failed to check bucket"));
        assert_eq!(tx.len(&bucket).expect("failed to count"), 1);
    }

    {
        let mut tx = engine.begin_write().expect("failed to begin write");
        tx.delete_bucket(&bucket).expect("failed to delete bucket");
        assert!(!tx.bucket_exists(&bucket).expect("failed to check bucket"));

        let again = tx.delete_bucket(&bucket);
        assert!(matches!(again, Err(StoreError::BucketNotFound(_))));
        tx.commit().expect("failed to commit");
    }

    H::cleanup(engine);
}

/// Test basic get/put/delete operations.
fn test_basic_operations<H: TestHarness>() {
    let engine = H::create_engine().expect("failed to create engine");
    let bucket = bucket();
    seed(&engine, &[(b"key1", b"value1")]);

    {
        let tx = engine.begin_read().expect("failed to begin read");
        let value = tx.get(&bucket, b"key1").expect("failed to get");
        assert_eq!(value, Some(b"value1".to_vec()));
    }

    // Update the value
    {
        let mut tx = engine.begin_write().expect("failed to begin write");
        tx.put(&bucket, b"key1", b"value1_updated").expect("failed to put");
        tx.commit().expect("failed to commit");
    }

    {
        let tx = engine.begin_read().expect("failed to begin read");
        let value = tx.get(&bucket, b"key1").expect("failed to get");
        assert_eq!(value, Some(b"value1_updated".to_vec()));
        assert_eq!(tx.len(&bucket).expect("failed to count"), 1);
    }

    // Delete the key
    {
        let mut tx = engine.begin_write().expect("failed to begin write");
        let deleted = tx.delete(&bucket, b"key1").expect("failed to delete");
        assert!(deleted);
        tx.commit().expect("failed to commit");
    }

    {
        let tx = engine.begin_read().expect("failed to begin read");
        let value = tx.get(&bucket, b"key1").expect("failed to get");
        assert_eq!(value, None);
        assert_eq!(tx.len(&bucket).expect("failed to count"), 0);
    }

    // Delete non-existent key should return false
    {
        let mut tx = engine.begin_write().expect("failed to begin write");
        let deleted = tx.delete(&bucket, b"nonexistent").expect("failed to delete");
        assert!(!deleted);
        tx.rollback().expect("failed to rollback");
    }

    H::cleanup(engine);
}

/// Test that empty keys and empty values are stored, not treated as absent.
fn test_empty_keys_and_values<H: TestHarness>() {
    let engine = H::create_engine().expect("failed to create engine");
    let bucket = bucket();
    seed(&engine, &[(b"", b"empty key"), (b"empty value", b"")]);

    let tx = engine.begin_read().expect("failed to begin read");
    assert_eq!(tx.get(&bucket, b"").expect("failed to get"), Some(b"empty key".to_vec()));
    assert_eq!(tx.get(&bucket, b"empty value").expect("failed to get"), Some(Vec::new()));
    assert_eq!(tx.get(&bucket, b"missing").expect("failed to get"), None);
    assert_eq!(tx.len(&bucket).expect("failed to count"), 2);
    drop(tx);

    H::cleanup(engine);
}

/// Test that a read transaction keeps the snapshot it started with.
fn test_snapshot_isolation<H: TestHarness>() {
    let engine = H::create_engine().expect("failed to create engine");
    let bucket = bucket();
    seed(&engine, &[(b"key1", b"initial")]);

    {
        let read_tx = engine.begin_read().expect("failed to begin read");

        // A writer commits while the reader is still open
        {
            let mut write_tx = engine.begin_write().expect("failed to begin write");
            write_tx.put(&bucket, b"key1", b"updated").expect("failed to put");
            write_tx.put(&bucket, b"key2", b"new").expect("failed to put");
            write_tx.commit().expect("failed to commit");
        }

        let value = read_tx.get(&bucket, b"key1").expect("failed to get");
        assert_eq!(value, Some(b"initial".to_vec()));
        assert_eq!(read_tx.get(&bucket, b"key2").expect("failed to get"), None);
        assert_eq!(read_tx.len(&bucket).expect("failed to count"), 1);
    }

    // New read transaction sees updated value
    {
        let read_tx = engine.begin_read().expect("failed to begin read");
        let value = read_tx.get(&bucket, b"key1").expect("failed to get");
        assert_eq!(value, Some(b"updated".to_vec()));
        assert_eq!(read_tx.len(&bucket).expect("failed to count"), 2);
    }

    H::cleanup(engine);
}

/// Test that iteration visits keys in ascending byte order.
fn test_iteration_order<H: TestHarness>() {
    let engine = H::create_engine().expect("failed to create engine");
    let bucket = bucket();
    seed(
        &engine,
        &[(b"b", b"2"), (&[0xFF], b"max"), (b"ab", b"12"), (b"", b"empty"), (b"a", b"1")],
    );

    let tx = engine.begin_read().expect("failed to begin read");
    let mut keys = Vec::new();
    tx.for_each(&bucket, |key, _| {
        keys.push(key.to_vec());
        Ok::<_, StoreError>(())
    })
    .expect("failed to iterate");

    let expected: Vec<Vec<u8>> =
        vec![b"".to_vec(), b"a".to_vec(), b"ab".to_vec(), b"b".to_vec(), vec![0xFF]];
    assert_eq!(keys, expected);
    drop(tx);

    H::cleanup(engine);
}

#[derive(Debug)]
enum WalkError {
    Stop(Vec<u8>),
    Store(StoreError),
}

impl From<StoreError> for WalkError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

/// Test that a callback error stops the walk and comes back unchanged.
fn test_iteration_stops_on_error<H: TestHarness>() {
    let engine = H::create_engine().expect("failed to create engine");
    let bucket = bucket();
    seed(&engine, &[(b"a", b"1"), (b"b", b"2"), (b"c", b"3")]);

    let tx = engine.begin_read().expect("failed to begin read");
    let mut visited = 0;
    let result = tx.for_each(&bucket, |key, _| {
        visited += 1;
        if key == b"b" {
            return Err(WalkError::Stop(key.to_vec()));
        }
        Ok(())
    });

    assert_eq!(visited, 2);
    match result {
        Err(WalkError::Stop(key)) => assert_eq!(key, b"b"),
        other => panic!("unexpected result: {other:?}"),
    }
    drop(tx);

    H::cleanup(engine);
}

/// Test that deleting and recreating a bucket is all-or-nothing.
fn test_delete_bucket_is_atomic<H: TestHarness>() {
    let engine = H::create_engine().expect("failed to create engine");
    let bucket = bucket();
    seed(&engine, &[(b"a", b"1"), (b"b", b"2")]);

    // Delete without commit leaves the bucket intact
    {
        let mut tx = engine.begin_write().expect("failed to begin write");
        tx.delete_bucket(&bucket).expect("failed to delete bucket");
        tx.rollback().expect("failed to rollback");
    }

    {
        let tx = engine.begin_read().expect("failed to begin read");
        assert_eq!(tx.len(&bucket).expect("failed to count"), 2);
    }

    // Dropping an uncommitted transaction rolls back as well
    {
        let mut tx = engine.begin_write().expect("failed to begin write");
        tx.delete_bucket(&bucket).expect("failed to delete bucket");
        drop(tx);
    }

    {
        let tx = engine.begin_read().expect("failed to begin read");
        assert_eq!(tx.get(&bucket, b"a").expect("failed to get"), Some(b"1".to_vec()));
    }

    // Delete plus recreate in one commit empties the bucket
    {
        let mut tx = engine.begin_write().expect("failed to begin write");
        tx.delete_bucket(&bucket).expect("failed to delete bucket");
        tx.create_bucket(&bucket).expect("failed to create bucket");
        tx.commit().expect("failed to commit");
    }

    {
        let tx = engine.begin_read().expect("failed to begin read");
        assert!(tx.bucket_exists(&bucket).expect("failed to check bucket"));
        assert_eq!(tx.len(&bucket).expect("failed to count"), 0);
        assert_eq!(tx.get(&bucket, b"a").expect("failed to get"), None);
    }

    H::cleanup(engine);
}

/// Test reads against a bucket that was never created.
fn test_missing_bucket<H: TestHarness>() {
    let engine = H::create_engine().expect("failed to create engine");
    let missing = BucketName::new("missing").expect("valid bucket name");

    let tx = engine.begin_read().expect("failed to begin read");
    assert!(matches!(tx.get(&missing, b"key"), Err(StoreError::BucketNotFound(_))));
    assert!(matches!(tx.len(&missing), Err(StoreError::BucketNotFound(_))));
    drop(tx);

    H::cleanup(engine);
}

/// Test that read-only transactions reject write operations.
fn test_read_only_enforcement<H: TestHarness>() {
    let engine = H::create_engine().expect("failed to create engine");
    let bucket = bucket();
    seed(&engine, &[(b"key", b"value")]);

    {
        let mut tx = engine.begin_read().expect("failed to begin read");
        assert!(tx.is_read_only());
        assert!(matches!(tx.put(&bucket, b"key", b"other"), Err(StoreError::ReadOnly)));
        assert!(matches!(tx.delete(&bucket, b"key"), Err(StoreError::ReadOnly)));
        assert!(matches!(tx.create_bucket(&bucket), Err(StoreError::ReadOnly)));
        assert!(matches!(tx.delete_bucket(&bucket), Err(StoreError::ReadOnly)));
    }

    {
        let tx = engine.begin_write().expect("failed to begin write");
        assert!(!tx.is_read_only());
        tx.rollback().expect("failed to rollback");
    }

    {
        let tx = engine.begin_read().expect("failed to begin read");
        assert_eq!(tx.get(&bucket, b"key").expect("failed to get"), Some(b"value".to_vec()));
    }

    H::cleanup(engine);
}

/// Test error types are properly constructed and implement Error trait.
#[test]
fn test_error_types() {
    fn assert_error<E: std::error::Error + Send + Sync + 'static>() {}
    assert_error::<StoreError>();

    let open_err = StoreError::Open("test".to_string());
    assert!(open_err.to_string().contains("test"));

    let bucket_err = StoreError::BucketNotFound("users".to_string());
    assert!(bucket_err.to_string().contains("users"));

    let read_only_err = StoreError::ReadOnly;
    assert!(read_only_err.to_string().contains("read-only"));

    let timeout_err = StoreError::LockTimeout {
        path: "data/users.db".into(),
        timeout: std::time::Duration::from_millis(100),
    };
    assert!(timeout_err.to_string().contains("users.db"));

    let io_err: StoreError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert!(matches!(io_err, StoreError::Io(_)));
}
