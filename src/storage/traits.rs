//! Storage traits and error types
//!
//! The import pipeline talks to two collaborators: a document store that
//! holds imported testimonials, and the run history log. Both are traits so
//! the pipeline can be exercised against failing or unavailable stores.

use crate::storage::{ImportedRecord, RecordField, RunRecord, RunStatus, StoredRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage lock poisoned")]
    Lock,

    #[error("Storage operation timed out after {0}s")]
    Timeout(u64),

    #[error("Invalid stored value: {0}")]
    Corrupt(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistent home of imported testimonials
pub trait DocumentStore {
    /// Inserts a testimonial and returns its id
    fn insert(&mut self, record: &ImportedRecord) -> StorageResult<i64>;

    /// Returns every record whose `field` contains `needle` (case-sensitive)
    fn query_by_field_contains(
        &self,
        field: RecordField,
        needle: &str,
    ) -> StorageResult<Vec<StoredRecord>>;

    /// Whether the store can currently accept writes
    fn is_available(&self) -> bool;

    /// Total number of stored testimonials
    fn count_records(&self) -> StorageResult<u64>;
}

/// Append-only log of import attempts
pub trait RunHistoryStore {
    /// Appends a run record and returns its id
    fn append_run(
        &mut self,
        timestamp: i64,
        status: RunStatus,
        imported_count: u64,
        message: Option<&str>,
    ) -> StorageResult<i64>;

    /// Most recent runs, newest first
    fn recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;

    /// Every run, oldest first
    fn all_runs(&self) -> StorageResult<Vec<RunRecord>>;

    /// Unix timestamp of the last successful import, if any
    fn last_import_at(&self) -> StorageResult<Option<i64>>;

    fn set_last_import_at(&mut self, timestamp: i64) -> StorageResult<()>;

    /// Deletes all but the newest `keep` runs, returning how many were removed
    fn prune_runs(&mut self, keep: usize) -> StorageResult<usize>;

    /// Claims the run lease for `identity` on behalf of `owner`
    ///
    /// Returns false while a different owner holds a lease claimed less than
    /// `stale_after_secs` before `now`. Older leases are taken over.
    fn claim_run(
        &mut self,
        identity: &str,
        owner: &str,
        now: i64,
        stale_after_secs: i64,
    ) -> StorageResult<bool>;

    /// Drops the lease for `identity` if `owner` still holds it
    fn release_run(&mut self, identity: &str, owner: &str) -> StorageResult<()>;
}

/// Everything the importer needs from a single backend
pub trait Storage: DocumentStore + RunHistoryStore {}

impl<T: DocumentStore + RunHistoryStore> Storage for T {}
