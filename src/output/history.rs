//! Import run history view

use crate::storage::{RunHistoryStore, RunRecord, RunStatus, StorageResult, HISTORY_DISPLAY_LIMIT};
use chrono::{Local, TimeZone};
use std::fmt::Display;
use std::fmt::Write as _;

/// Shown when no run has been recorded yet
pub const EMPTY_HISTORY_MESSAGE: &str = "No import history available yet.";

const RUN_DATE_FORMAT: &str = "%B %-d, %Y, %-I:%M %P";

/// The runs shown by the history view, newest first
pub fn load_history(store: &dyn RunHistoryStore) -> StorageResult<Vec<RunRecord>> {
    store.recent_runs(HISTORY_DISPLAY_LIMIT)
}

/// Formats a run timestamp like "March 9, 2024, 2:05 pm"
pub fn format_run_date<Tz>(timestamp: i64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match tz.timestamp_opt(timestamp, 0).single() {
        Some(dt) => dt.format(RUN_DATE_FORMAT).to_string(),
        None => timestamp.to_string(),
    }
}

fn status_label(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Started => "Started",
        RunStatus::Success => "Success",
        RunStatus::Failed => "Failed",
    }
}

/// Renders runs as a text table in the given time zone
pub fn format_history<Tz>(runs: &[RunRecord], tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    if runs.is_empty() {
        return format!("{}\n", EMPTY_HISTORY_MESSAGE);
    }

    let mut out = String::new();
    let _ = writeln!(out, "=== Import History ===\n");
    let _ = writeln!(out, "{:<30} {:>8}  {:<8} Message", "Date", "Imported", "Status");
    for run in runs.iter().take(HISTORY_DISPLAY_LIMIT) {
        let _ = writeln!(
            out,
            "{:<30} {:>8}  {:<8} {}",
            format_run_date(run.timestamp, tz),
            run.imported_count,
            status_label(run.status),
            run.message.as_deref().unwrap_or("")
        );
    }
    out
}

/// Prints runs to stdout using local time
pub fn print_history(runs: &[RunRecord]) {
    print!("{}", format_history(runs, &Local));
}
