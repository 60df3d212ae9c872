//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the document store
//! and run history traits.

use crate::storage::schema::{initialize_schema, LAST_IMPORT_KEY};
use crate::storage::traits::{DocumentStore, RunHistoryStore, StorageError, StorageResult};
use crate::storage::{ImportedRecord, RecordField, RunRecord, RunStatus, StoredRecord};
use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
    read_only: bool,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn,
            read_only: false,
        })
    }

    /// Opens an existing database without write access
    ///
    /// The history view uses this so it never creates or migrates a database.
    /// A read-only store reports itself as unavailable for imports.
    pub fn open_read_only(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
        Ok(Self {
            conn,
            read_only: true,
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn,
            read_only: false,
        })
    }

    /// Bounds how long a write waits on a locked database
    pub fn set_busy_timeout(&self, timeout: Duration) -> StorageResult<()> {
        self.conn.busy_timeout(timeout)?;
        Ok(())
    }

    fn table_exists(&self, table: &str) -> StorageResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )?;
        Ok(count == 1)
    }
}

fn stored_record_from_row(row: &Row<'_>) -> rusqlite::Result<StoredRecord> {
    Ok(StoredRecord {
        id: row.get(0)?,
        record: ImportedRecord {
            title: row.get(1)?,
            body: row.get(2)?,
            summary: row.get(3)?,
            rating_text: row.get(4)?,
            date_iso: row.get(5)?,
            source: row.get(6)?,
        },
        imported_at: row.get(7)?,
    })
}

fn run_record_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    let status: String = row.get(3)?;
    Ok(RunRecord {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        imported_count: row.get::<_, i64>(2)?.max(0) as u64,
        status: RunStatus::from_db_string(&status).unwrap_or(RunStatus::Failed),
        message: row.get(4)?,
    })
}

impl DocumentStore for SqliteStorage {
    fn insert(&mut self, record: &ImportedRecord) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO testimonials (title, body, summary, rating, review_date, source, imported_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.title,
                record.body,
                record.summary,
                record.rating_text,
                record.date_iso,
                record.source,
                now
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn query_by_field_contains(
        &self,
        field: RecordField,
        needle: &str,
    ) -> StorageResult<Vec<StoredRecord>> {
        // instr() is case-sensitive, unlike LIKE
        let sql = format!(
            "SELECT id, title, body, summary, rating, review_date, source, imported_at
             FROM testimonials WHERE instr({}, ?1) > 0 ORDER BY id",
            field.column()
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let records = stmt
            .query_map(params![needle], stored_record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn is_available(&self) -> bool {
        !self.read_only && matches!(self.table_exists("testimonials"), Ok(true))
    }

    fn count_records(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM testimonials", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl RunHistoryStore for SqliteStorage {
    fn append_run(
        &mut self,
        timestamp: i64,
        status: RunStatus,
        imported_count: u64,
        message: Option<&str>,
    ) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO import_runs (ran_at, imported_count, status, message) VALUES (?1, ?2, ?3, ?4)",
            params![timestamp, imported_count as i64, status.to_db_string(), message],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, ran_at, imported_count, status, message
             FROM import_runs ORDER BY id DESC LIMIT ?1",
        )?;

        let runs = stmt
            .query_map(params![limit as i64], run_record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(runs)
    }

    fn all_runs(&self) -> StorageResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, ran_at, imported_count, status, message FROM import_runs ORDER BY id ASC",
        )?;

        let runs = stmt
            .query_map([], run_record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(runs)
    }

    fn last_import_at(&self) -> StorageResult<Option<i64>> {
        if !self.table_exists("settings")? {
            return Ok(None);
        }

        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![LAST_IMPORT_KEY],
                |row| row.get(0),
            )
            .optional()?;

        value
            .map(|v| {
                v.parse::<i64>()
                    .map_err(|_| StorageError::Corrupt(format!("{} = '{}'", LAST_IMPORT_KEY, v)))
            })
            .transpose()
    }

    fn set_last_import_at(&mut self, timestamp: i64) -> StorageResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![LAST_IMPORT_KEY, timestamp.to_string()],
        )?;
        Ok(())
    }

    fn prune_runs(&mut self, keep: usize) -> StorageResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM import_runs WHERE id NOT IN
             (SELECT id FROM import_runs ORDER BY id DESC LIMIT ?1)",
            params![keep as i64],
        )?;
        Ok(removed)
    }

    fn claim_run(
        &mut self,
        identity: &str,
        owner: &str,
        now: i64,
        stale_after_secs: i64,
    ) -> StorageResult<bool> {
        // The write lock is held from the first statement, so the check and
        // the insert are atomic across connections
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let reclaimed = tx.execute(
            "DELETE FROM run_leases WHERE identity = ?1 AND owner != ?2 AND claimed_at <= ?3",
            params![identity, owner, now.saturating_sub(stale_after_secs)],
        )?;
        if reclaimed > 0 {
            tracing::warn!("Taking over an abandoned import lease");
        }

        let claimed = tx.execute(
            "INSERT OR IGNORE INTO run_leases (identity, owner, claimed_at) VALUES (?1, ?2, ?3)",
            params![identity, owner, now],
        )?;
        tx.commit()?;

        Ok(claimed == 1)
    }

    fn release_run(&mut self, identity: &str, owner: &str) -> StorageResult<()> {
        self.conn.execute(
            "DELETE FROM run_leases WHERE identity = ?1 AND owner = ?2",
            params![identity, owner],
        )?;
        Ok(())
    }
}
