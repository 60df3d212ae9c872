//! Scheduled and manual import triggers
//!
//! The scheduler wakes up every `schedule-interval-days`, reloads the
//! configuration from disk and runs one import. Manual imports go through
//! `manual_import`, which refuses callers without permission before anything
//! runs.

use crate::config::{load_config, Credentials};
use crate::importer::{ImportOutcome, Importer};
use crate::storage::Storage;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};

/// Periodically runs imports with freshly loaded configuration
pub struct Scheduler<S> {
    config_path: PathBuf,
    importer: Importer<S>,
}

impl<S: Storage + Send + 'static> Scheduler<S> {
    pub fn new(config_path: impl Into<PathBuf>, importer: Importer<S>) -> Self {
        Self {
            config_path: config_path.into(),
            importer,
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Runs imports forever
    ///
    /// The first import starts immediately. A failed tick is logged and the
    /// loop waits for the next one. When a reloaded configuration changes the
    /// interval, the new interval applies from the current tick onwards.
    pub async fn run(mut self) {
        let mut period = self.importer.settings().schedule_interval();
        let mut ticker = new_ticker(period);
        tracing::info!(
            "Scheduler started, importing every {} days",
            self.importer.settings().schedule_interval_days
        );

        loop {
            ticker.tick().await;

            match self.tick().await {
                Ok(imported) => tracing::info!("Scheduled import finished: {} new reviews", imported),
                Err(e) => tracing::error!("Scheduled import failed: {}", e),
            }

            let configured = self.importer.settings().schedule_interval();
            if configured != period {
                tracing::info!(
                    "Schedule changed to every {} days",
                    self.importer.settings().schedule_interval_days
                );
                period = configured;
                ticker = tokio::time::interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            }
        }
    }

    /// Reloads the configuration and runs one import
    pub async fn tick(&mut self) -> crate::Result<usize> {
        let config = load_config(&self.config_path)?;
        self.importer.apply_config(&config);
        let imported = self.importer.run(&config.credentials()).await?;
        Ok(imported)
    }
}

fn new_ticker(period: Duration) -> Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Who is asking for a manual import
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    /// Result of the embedding application's permission check
    pub authorized: bool,
}

impl Caller {
    pub fn authorized() -> Self {
        Self { authorized: true }
    }

    pub fn unauthorized() -> Self {
        Self { authorized: false }
    }
}

/// Why a manual import was refused
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TriggerError {
    #[error("caller is not allowed to run imports")]
    Unauthorized,
}

/// What the operator is told after a manual import
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportNotice {
    pub outcome: ImportOutcome,
    pub message: String,
}

impl ImportNotice {
    pub fn from_outcome(outcome: ImportOutcome) -> Self {
        let message = match outcome {
            ImportOutcome::Imported(count) => {
                format!("Import complete! {} new reviews imported.", count)
            }
            ImportOutcome::Failed => {
                "Error importing reviews. Check error log for details.".to_string()
            }
        };
        Self { outcome, message }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ImportOutcome::Imported(_))
    }
}

/// Runs an import on behalf of an operator
///
/// Unauthorized callers are rejected before the import starts, so no run is
/// recorded for them.
pub async fn manual_import<S: Storage + Send + 'static>(
    importer: &Importer<S>,
    credentials: &Credentials,
    caller: Caller,
) -> Result<ImportNotice, TriggerError> {
    if !caller.authorized {
        tracing::warn!("Rejected manual import from unauthorized caller");
        return Err(TriggerError::Unauthorized);
    }

    tracing::info!("Manual import requested");
    let result = importer.run(credentials).await;
    Ok(ImportNotice::from_outcome(ImportOutcome::from_result(&result)))
}
