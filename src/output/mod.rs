//! Output module for operator-facing reports
//!
//! This module handles:
//! - The health snapshot (configuration, API reachability, import recency)
//! - The import run history listing

mod health;
mod history;

pub use health::{format_health, print_health, HealthReporter, HealthSnapshot, ImportRecency};
pub use history::{
    format_history, format_run_date, load_history, print_history, EMPTY_HISTORY_MESSAGE,
};
