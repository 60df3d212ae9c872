//! Import pipeline orchestration
//!
//! This module ties the pieces of an import run together:
//! - Validating credentials and the document store before any network access
//! - Walking every result page of the Place Details API
//! - Filtering out reviews that were already imported
//! - Persisting new testimonials one at a time, tolerating individual failures
//! - Recording exactly one history entry per run, even when the run is cancelled
//! - Keeping a second run for the same credentials out, also across processes

mod dedup;
mod normalize;

pub use dedup::Deduplicator;
pub use normalize::{
    clean_body, normalize, summarize, ANONYMOUS_TITLE, DEFAULT_RATING, SUMMARY_WORDS,
};

use crate::config::{Config, Credentials, ImportConfig};
use crate::fetcher::{FetchError, HttpFetcher, PaginationWalker, ReqwestFetcher};
use crate::storage::{
    ImportedRecord, RunHistoryStore, RunStatus, Storage, StorageError, StorageResult,
};
use chrono::Utc;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Age after which a run lease left behind by a crashed process is taken over
pub const RUN_LEASE_STALE_SECS: i64 = 60 * 60;

static NEXT_LEASE_OWNER: AtomicU64 = AtomicU64::new(0);

/// Why an import run failed
///
/// The display text of each variant is the message written to the run history.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("API key or Place ID not set")]
    ConfigMissing,

    #[error("document store is not available")]
    DependencyMissing,

    #[error("API connection error: {0}")]
    Transport(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("import already in progress")]
    AlreadyRunning,

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("import cancelled before completion")]
    Cancelled,
}

impl ImportError {
    /// Short stable label for logs and exit reporting
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigMissing => "config_missing",
            Self::DependencyMissing => "dependency_missing",
            Self::Transport(_) => "transport",
            Self::Api(_) => "api",
            Self::AlreadyRunning => "already_running",
            Self::Storage(_) => "storage",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<FetchError> for ImportError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Transport(t) => Self::Transport(t.message),
            FetchError::Api { message, .. } => Self::Api(message),
            FetchError::Malformed(detail) => Self::Api(format!("malformed response: {}", detail)),
        }
    }
}

/// Flattened view of a run result for callers that only need a count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    Imported(usize),
    Failed,
}

impl ImportOutcome {
    pub fn from_result(result: &Result<usize, ImportError>) -> Self {
        match result {
            Ok(count) => Self::Imported(*count),
            Err(_) => Self::Failed,
        }
    }
}

/// A testimonial that could not be saved
#[derive(Debug)]
pub struct PersistFailure {
    pub title: String,
    pub error: StorageError,
}

impl fmt::Display for PersistFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to save review from {}: {}", self.title, self.error)
    }
}

/// Result of a run that reached a successful end
#[derive(Debug)]
struct RunSummary {
    imported: usize,
    message: String,
}

impl RunSummary {
    fn nothing(message: &str) -> Self {
        Self {
            imported: 0,
            message: message.to_string(),
        }
    }
}

/// Runs imports against a shared store
///
/// Clones share the store and the set of in-flight runs, so two clones never
/// import for the same credentials at once. Importers in other processes are
/// kept out by a lease row in the shared database.
pub struct Importer<S> {
    storage: Arc<Mutex<S>>,
    fetcher: Arc<dyn HttpFetcher>,
    endpoint: String,
    settings: ImportConfig,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl<S> Clone for Importer<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            fetcher: Arc::clone(&self.fetcher),
            endpoint: self.endpoint.clone(),
            settings: self.settings.clone(),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl<S: Storage + Send + 'static> Importer<S> {
    pub fn new(
        storage: Arc<Mutex<S>>,
        fetcher: Arc<dyn HttpFetcher>,
        endpoint: impl Into<String>,
        settings: ImportConfig,
    ) -> Self {
        Self {
            storage,
            fetcher,
            endpoint: endpoint.into(),
            settings,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Creates an importer that talks to the API over HTTP
    pub fn from_config(config: &Config, storage: Arc<Mutex<S>>) -> Result<Self, reqwest::Error> {
        let fetcher = ReqwestFetcher::from_config(&config.client, &config.import)?;
        Ok(Self::new(
            storage,
            Arc::new(fetcher),
            config.google.endpoint.clone(),
            config.import.clone(),
        ))
    }

    /// Picks up a reloaded endpoint and timing settings for later runs
    pub fn apply_config(&mut self, config: &Config) {
        self.endpoint = config.google.endpoint.clone();
        self.settings = config.import.clone();
    }

    pub fn storage(&self) -> &Arc<Mutex<S>> {
        &self.storage
    }

    pub fn fetcher(&self) -> &Arc<dyn HttpFetcher> {
        &self.fetcher
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn settings(&self) -> &ImportConfig {
        &self.settings
    }

    /// Runs one complete import and returns the number of new testimonials
    ///
    /// # Run Flow
    ///
    /// 1. Claim the run slot for these credentials, here and in the shared store
    /// 2. Check that both credentials are set and the store accepts writes
    /// 3. Fetch every page of reviews
    /// 4. Keep reviews whose text is not already stored
    /// 5. Insert each new testimonial; failed inserts are logged and skipped
    /// 6. Update the last-import marker
    ///
    /// Every call appends exactly one entry to the run history. If the
    /// returned future is dropped before it finishes, the entry is written as
    /// a cancelled failure.
    pub async fn run(&self, credentials: &Credentials) -> Result<usize, ImportError> {
        let mut recorder = RunRecorder::new(Arc::clone(&self.storage), Utc::now().timestamp());

        let _slot =
            match RunSlot::acquire(&self.in_flight, &self.storage, credentials.identity()).await {
                Ok(Some(slot)) => slot,
                Ok(None) => {
                    tracing::warn!("Import already running for place {}", credentials.place_id);
                    return recorder.finish(Err(ImportError::AlreadyRunning)).await;
                }
                Err(e) => return recorder.finish(Err(e.into())).await,
            };

        let result = self.import(credentials).await;
        recorder.finish(result).await
    }

    async fn import(&self, credentials: &Credentials) -> Result<RunSummary, ImportError> {
        if !credentials.is_complete() {
            return Err(ImportError::ConfigMissing);
        }
        if !on_store(&self.storage, |store| Ok(store.is_available())).await? {
            return Err(ImportError::DependencyMissing);
        }

        tracing::info!("Fetching reviews for place {}", credentials.place_id);
        let walker = PaginationWalker::new(
            self.fetcher.as_ref(),
            &self.endpoint,
            self.settings.page_delay(),
            self.settings.request_timeout(),
        );
        let fetched = walker.fetch_all_pages(credentials).await?;
        tracing::info!(
            "Fetched {} reviews across {} pages",
            fetched.reviews.len(),
            fetched.pages_fetched
        );

        if !fetched.reviews_present {
            return Ok(RunSummary::nothing("No reviews found"));
        }

        let today = Utc::now().date_naive();
        let reviews = fetched.reviews;
        let new_records = on_store(&self.storage, move |store| {
            let mut dedup = Deduplicator::new();
            let mut new_records = Vec::new();

            for raw in &reviews {
                let Some(record) = normalize(raw, today) else {
                    tracing::debug!("Skipping review without text");
                    continue;
                };
                if dedup.is_new(&record.body, &*store)? {
                    new_records.push(record);
                } else {
                    tracing::debug!("Skipping already imported review from {}", record.title);
                }
            }
            Ok(new_records)
        })
        .await?;

        if new_records.is_empty() {
            return Ok(RunSummary::nothing("No new reviews found"));
        }

        let mut imported = 0;
        let mut failures = Vec::new();
        for record in new_records {
            let title = record.title.clone();
            match self.persist(record).await {
                Ok(id) => {
                    imported += 1;
                    tracing::debug!("Saved review from {} as testimonial {}", title, id);
                }
                Err(error) => {
                    let failure = PersistFailure { title, error };
                    tracing::warn!("{}", failure);
                    failures.push(failure);
                }
            }
        }
        if !failures.is_empty() {
            tracing::warn!("{} new reviews could not be saved", failures.len());
        }

        let finished_at = Utc::now().timestamp();
        on_store(&self.storage, move |store| store.set_last_import_at(finished_at)).await?;

        Ok(RunSummary {
            imported,
            message: format!("Successfully imported {} new reviews", imported),
        })
    }

    /// Inserts one testimonial off the async executor, bounded by the persist timeout
    ///
    /// A timed-out insert is reported as failed even though the blocking
    /// write may still land afterwards.
    async fn persist(&self, record: ImportedRecord) -> Result<i64, StorageError> {
        let limit = self.settings.persist_timeout();
        let insert = on_store(&self.storage, move |store| store.insert(&record));

        match tokio::time::timeout(limit, insert).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout(limit.as_secs())),
        }
    }
}

/// Runs `f` against the locked store on the blocking pool
///
/// A write still holding the lock after its timeout stalls a blocking
/// thread here, never the async executor.
async fn on_store<S, T, F>(storage: &Arc<Mutex<S>>, f: F) -> StorageResult<T>
where
    S: Send + 'static,
    T: Send + 'static,
    F: FnOnce(&mut S) -> StorageResult<T> + Send + 'static,
{
    let storage = Arc::clone(storage);
    tokio::task::spawn_blocking(move || {
        let mut store = storage.lock().map_err(|_| StorageError::Lock)?;
        f(&mut *store)
    })
    .await
    .map_err(|e| StorageError::Database(format!("storage task failed: {}", e)))?
}

/// Claim on the run slot for one credential identity, released on drop
///
/// Holds both the in-process slot and the lease row in the store. The drop
/// releases the lease with a blocking lock on the dropping thread, since a
/// guard cannot await.
struct RunSlot<S: RunHistoryStore> {
    in_flight: Arc<Mutex<HashSet<String>>>,
    storage: Arc<Mutex<S>>,
    identity: String,
    owner: String,
}

impl<S: RunHistoryStore + Send + 'static> RunSlot<S> {
    /// Claims the in-process slot, then the store lease
    ///
    /// Returns `None` when another run holds either of them.
    async fn acquire(
        in_flight: &Arc<Mutex<HashSet<String>>>,
        storage: &Arc<Mutex<S>>,
        identity: String,
    ) -> StorageResult<Option<Self>> {
        if !lock_slots(in_flight).insert(identity.clone()) {
            return Ok(None);
        }

        // Dropping the slot from here on gives back both claims
        let slot = Self {
            in_flight: Arc::clone(in_flight),
            storage: Arc::clone(storage),
            identity,
            owner: lease_owner(),
        };

        let identity = slot.identity.clone();
        let owner = slot.owner.clone();
        let now = Utc::now().timestamp();
        let claimed = on_store(storage, move |store| {
            store.claim_run(&identity, &owner, now, RUN_LEASE_STALE_SECS)
        })
        .await?;

        Ok(claimed.then_some(slot))
    }
}

impl<S: RunHistoryStore> Drop for RunSlot<S> {
    fn drop(&mut self) {
        match self.storage.lock() {
            Ok(mut store) => {
                if let Err(e) = store.release_run(&self.identity, &self.owner) {
                    tracing::error!("Failed to release import lease: {}", e);
                }
            }
            Err(_) => tracing::error!("Failed to release import lease: storage lock poisoned"),
        }
        lock_slots(&self.in_flight).remove(&self.identity);
    }
}

/// Unique lease owner tag for this process and run
fn lease_owner() -> String {
    format!(
        "{}-{}",
        std::process::id(),
        NEXT_LEASE_OWNER.fetch_add(1, Ordering::Relaxed)
    )
}

// The slot set holds plain strings, so a poisoned lock is still consistent
fn lock_slots(slots: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Writes the history entry of one run
///
/// Dropping the recorder without calling `finish` appends a cancelled
/// failure instead. That append locks the store on the dropping thread.
struct RunRecorder<S: RunHistoryStore> {
    storage: Arc<Mutex<S>>,
    started_at: i64,
    recorded: bool,
}

impl<S: RunHistoryStore + Send + 'static> RunRecorder<S> {
    fn new(storage: Arc<Mutex<S>>, started_at: i64) -> Self {
        Self {
            storage,
            started_at,
            recorded: false,
        }
    }

    async fn finish(
        &mut self,
        result: Result<RunSummary, ImportError>,
    ) -> Result<usize, ImportError> {
        match result {
            Ok(summary) => {
                tracing::info!("{}", summary.message);
                self.append(RunStatus::Success, summary.imported as u64, &summary.message)
                    .await?;
                Ok(summary.imported)
            }
            Err(e) => {
                tracing::error!("Import failed ({}): {}", e.kind(), e);
                if let Err(record_err) = self.append(RunStatus::Failed, 0, &e.to_string()).await {
                    tracing::error!("Failed to record import run: {}", record_err);
                }
                Err(e)
            }
        }
    }

    async fn append(&mut self, status: RunStatus, count: u64, message: &str) -> StorageResult<()> {
        // The blocking append finishes even if this future is dropped
        self.recorded = true;
        let started_at = self.started_at;
        let message = message.to_string();
        on_store(&self.storage, move |store| {
            store.append_run(started_at, status, count, Some(&message))
        })
        .await?;
        Ok(())
    }
}

impl<S: RunHistoryStore> Drop for RunRecorder<S> {
    fn drop(&mut self) {
        if self.recorded {
            return;
        }

        tracing::warn!("Import run dropped before completion");
        let message = ImportError::Cancelled.to_string();
        match self.storage.lock() {
            Ok(mut store) => {
                if let Err(e) =
                    store.append_run(self.started_at, RunStatus::Failed, 0, Some(&message))
                {
                    tracing::error!("Failed to record cancelled run: {}", e);
                }
            }
            Err(_) => tracing::error!("Failed to record cancelled run: storage lock poisoned"),
        }
    }
}
