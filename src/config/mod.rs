//! Configuration module for the review importer
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! and resolving the API credentials an import run uses.
//!
//! # Example
//!
//! ```no_run
//! use review_importer::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("review-importer.toml")).unwrap();
//! println!("Pages are fetched {}ms apart", config.import.page_delay_ms);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ClientConfig, Config, Credentials, GoogleConfig, ImportConfig, StorageConfig, API_KEY_ENV,
    DEFAULT_ENDPOINT, PLACE_ID_ENV,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
