//! Review Importer: scheduled import of Google reviews as testimonials
//!
//! This crate pulls reviews for a single place from the Google Place Details
//! API, deduplicates them against previously imported testimonials, persists
//! the new ones, and keeps an auditable history of every import run together
//! with an operator-facing health view.

pub mod config;
pub mod fetcher;
pub mod importer;
pub mod output;
pub mod scheduler;
pub mod storage;

use thiserror::Error;

/// Main error type for review importer operations
#[derive(Debug, Error)]
pub enum ImporterError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Import failed: {0}")]
    Import(#[from] importer::ImportError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for review importer operations
pub type Result<T> = std::result::Result<T, ImporterError>;

// Re-export commonly used types
pub use config::{Config, Credentials};
pub use importer::{ImportError, Importer};
pub use storage::{ImportedRecord, RunRecord, RunStatus, SqliteStorage};
