//! Content-based duplicate detection

use crate::storage::{DocumentStore, RecordField, StorageResult};

/// Decides whether a review body is new
///
/// A body is a duplicate when a stored testimonial already contains it
/// (case-sensitive), or when an earlier review of the same run contained it.
/// Create one per run.
#[derive(Debug, Default)]
pub struct Deduplicator {
    accepted: Vec<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks `body` and, when it is new, remembers it for the rest of the run
    pub fn is_new(&mut self, body: &str, store: &dyn DocumentStore) -> StorageResult<bool> {
        if self.accepted.iter().any(|seen| seen.contains(body)) {
            return Ok(false);
        }

        if !store
            .query_by_field_contains(RecordField::Body, body)?
            .is_empty()
        {
            return Ok(false);
        }

        self.accepted.push(body.to_string());
        Ok(true)
    }

    /// Bodies accepted so far in this run
    pub fn accepted(&self) -> usize {
        self.accepted.len()
    }
}
