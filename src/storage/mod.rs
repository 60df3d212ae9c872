//! Storage module for persisting testimonials and import history
//!
//! This module handles all database operations for the importer, including:
//! - SQLite database initialization and schema management
//! - Testimonial persistence and content lookup for deduplication
//! - The append-only import run log
//! - The last-import marker used by the health view

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{DocumentStore, RunHistoryStore, Storage, StorageError, StorageResult};

use std::path::Path;

/// Source label written on every imported testimonial
pub const REVIEW_SOURCE: &str = "Google";

/// Number of runs shown in the history view
pub const HISTORY_DISPLAY_LIMIT: usize = 10;

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// A testimonial as written to the document store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedRecord {
    /// Reviewer name
    pub title: String,
    /// Full review text
    pub body: String,
    /// First twenty words of the body
    pub summary: String,
    pub rating_text: String,
    /// Review date as YYYY-MM-DD
    pub date_iso: String,
    pub source: String,
}

/// A testimonial read back from the store
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub id: i64,
    pub record: ImportedRecord,
    pub imported_at: String,
}

/// Queryable testimonial fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    Title,
    Body,
}

impl RecordField {
    pub fn column(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Body => "body",
        }
    }
}

/// One entry of the import history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub id: i64,
    /// Unix timestamp when the run started
    pub timestamp: i64,
    pub imported_count: u64,
    pub status: RunStatus,
    pub message: Option<String>,
}

/// Outcome of an import run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Started,
    Success,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "started" => Some(Self::Started),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
