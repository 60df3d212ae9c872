//! Operator health view
//!
//! Combines four signals into one snapshot: whether credentials are set,
//! whether the API answers right now, how long ago the last import ran, and
//! whether the document store is usable. Snapshots are never cached.

use crate::config::{Credentials, ImportConfig};
use crate::fetcher::{probe_api, ApiProbe, HttpFetcher};
use crate::storage::{Storage, StorageResult};
use chrono::{DateTime, Local, TimeZone, Utc};
use std::fmt::Write as _;
use std::sync::Arc;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// How recent the last successful import is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportRecency {
    NeverRun,
    OnTrack { last_import_at: i64, days_since: i64 },
    Overdue { last_import_at: i64, days_since: i64 },
}

impl ImportRecency {
    /// Classifies a last-import timestamp against the overdue threshold
    ///
    /// Days are whole days, rounded down. A timestamp in the future counts as
    /// zero days ago.
    pub fn classify(last_import_at: Option<i64>, now: i64, overdue_after_days: u64) -> Self {
        let Some(last_import_at) = last_import_at else {
            return Self::NeverRun;
        };

        let days_since = (now - last_import_at).div_euclid(SECONDS_PER_DAY).max(0);
        if days_since > overdue_after_days as i64 {
            Self::Overdue {
                last_import_at,
                days_since,
            }
        } else {
            Self::OnTrack {
                last_import_at,
                days_since,
            }
        }
    }

    pub fn is_overdue(&self) -> bool {
        matches!(self, Self::Overdue { .. })
    }
}

/// Point-in-time health of the importer
#[derive(Debug, Clone, PartialEq)]
pub struct HealthSnapshot {
    pub configured: bool,
    pub api: ApiProbe,
    pub last_import: ImportRecency,
    pub dependency_present: bool,
    pub checked_at: DateTime<Utc>,
}

impl HealthSnapshot {
    /// True when nothing needs operator attention
    pub fn is_healthy(&self) -> bool {
        self.configured
            && self.api.is_reachable()
            && self.dependency_present
            && matches!(self.last_import, ImportRecency::OnTrack { .. })
    }
}

/// Builds health snapshots
pub struct HealthReporter {
    fetcher: Arc<dyn HttpFetcher>,
    endpoint: String,
    settings: ImportConfig,
}

impl HealthReporter {
    pub fn new(
        fetcher: Arc<dyn HttpFetcher>,
        endpoint: impl Into<String>,
        settings: ImportConfig,
    ) -> Self {
        Self {
            fetcher,
            endpoint: endpoint.into(),
            settings,
        }
    }

    /// Takes a fresh snapshot
    ///
    /// `store` is `None` when no database exists yet. Performs one live API
    /// request when credentials are set, bounded by the request timeout.
    pub async fn snapshot(
        &self,
        credentials: &Credentials,
        store: Option<&dyn Storage>,
    ) -> StorageResult<HealthSnapshot> {
        let (last_import_at, dependency_present) = match store {
            Some(store) => (store.last_import_at()?, store.is_available()),
            None => (None, false),
        };

        let api = probe_api(
            self.fetcher.as_ref(),
            &self.endpoint,
            credentials,
            self.settings.request_timeout(),
        )
        .await;

        let checked_at = Utc::now();
        Ok(HealthSnapshot {
            configured: credentials.is_complete(),
            api,
            last_import: ImportRecency::classify(
                last_import_at,
                checked_at.timestamp(),
                self.settings.overdue_after_days,
            ),
            dependency_present,
            checked_at,
        })
    }
}

/// Renders a snapshot as plain text
pub fn format_health(snapshot: &HealthSnapshot, overdue_after_days: u64) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Import Health ===\n");

    let configured = if snapshot.configured {
        "Configured".to_string()
    } else {
        "Not configured (API key or Place ID missing)".to_string()
    };
    let _ = writeln!(out, "Configuration: {}", configured);

    let api = match &snapshot.api {
        ApiProbe::Reachable => "Connected".to_string(),
        ApiProbe::Error(message) => format!("Error: {}", message),
        ApiProbe::NotConfigured => "Not checked (not configured)".to_string(),
    };
    let _ = writeln!(out, "API connection: {}", api);

    let last_import = match snapshot.last_import {
        ImportRecency::NeverRun => "Never".to_string(),
        ImportRecency::OnTrack {
            last_import_at,
            days_since,
        } => format!("{} ({} days ago)", local_date(last_import_at), days_since),
        ImportRecency::Overdue {
            last_import_at,
            days_since,
        } => format!(
            "{} ({} days ago, overdue after {} days)",
            local_date(last_import_at),
            days_since,
            overdue_after_days
        ),
    };
    let _ = writeln!(out, "Last import: {}", last_import);

    let store = if snapshot.dependency_present {
        "Available"
    } else {
        "Not available"
    };
    let _ = writeln!(out, "Document store: {}", store);
    let _ = writeln!(
        out,
        "Checked at: {}",
        snapshot.checked_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
    );

    out
}

/// Prints a snapshot to stdout
pub fn print_health(snapshot: &HealthSnapshot, overdue_after_days: u64) {
    print!("{}", format_health(snapshot, overdue_after_days));
}

fn local_date(timestamp: i64) -> String {
    match Local.timestamp_opt(timestamp, 0).single() {
        Some(dt) => dt.format("%B %-d, %Y").to_string(),
        None => timestamp.to_string(),
    }
}
