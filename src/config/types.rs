use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;

/// Default Place Details endpoint
pub const DEFAULT_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/place/details/json";

/// Environment variable consulted when the config file carries no API key
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Environment variable consulted when the config file carries no place id
pub const PLACE_ID_ENV: &str = "GOOGLE_PLACE_ID";

/// Main configuration structure for the review importer
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub import: ImportConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

impl Config {
    /// Builds a configuration with every optional section defaulted
    pub fn with_database(database_path: impl Into<String>) -> Self {
        Self {
            google: GoogleConfig::default(),
            import: ImportConfig::default(),
            storage: StorageConfig {
                database_path: database_path.into(),
            },
            client: ClientConfig::default(),
        }
    }

    /// Credentials from the file, falling back to the environment per field
    pub fn credentials(&self) -> Credentials {
        let file = Credentials {
            api_key: self.google.api_key.clone().unwrap_or_default(),
            place_id: self.google.place_id.clone().unwrap_or_default(),
        };
        file.or_env()
    }
}

/// Google Places API access
#[derive(Clone, Deserialize)]
pub struct GoogleConfig {
    #[serde(rename = "api-key", default)]
    pub api_key: Option<String>,

    #[serde(rename = "place-id", default)]
    pub place_id: Option<String>,

    /// Place Details endpoint; overridable for testing against a local server
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            place_id: None,
            endpoint: default_endpoint(),
        }
    }
}

impl fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("place_id", &self.place_id)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Import pipeline timing
#[derive(Debug, Clone, Deserialize)]
pub struct ImportConfig {
    /// Delay before requesting the next page with a continuation token (milliseconds)
    #[serde(rename = "page-delay-ms", default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Upper bound for a single testimonial insert
    #[serde(rename = "persist-timeout-secs", default = "default_persist_timeout")]
    pub persist_timeout_secs: u64,

    #[serde(rename = "schedule-interval-days", default = "default_schedule_days")]
    pub schedule_interval_days: u64,

    /// Days without an import after which the health view reports overdue
    #[serde(rename = "overdue-after-days", default = "default_overdue_days")]
    pub overdue_after_days: u64,
}

impl ImportConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn persist_timeout(&self) -> Duration {
        Duration::from_secs(self.persist_timeout_secs)
    }

    pub fn schedule_interval(&self) -> Duration {
        Duration::from_secs(self.schedule_interval_days.saturating_mul(24 * 60 * 60))
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            page_delay_ms: default_page_delay_ms(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            persist_timeout_secs: default_persist_timeout(),
            schedule_interval_days: default_schedule_days(),
            overdue_after_days: default_overdue_days(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database holding testimonials and run history
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// HTTP client identification
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_client_name")]
    pub name: String,

    #[serde(default = "default_client_version")]
    pub version: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: default_client_name(),
            version: default_client_version(),
        }
    }
}

/// API key and place id used for one import run
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub place_id: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, place_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            place_id: place_id.into(),
        }
    }

    /// Reads `GOOGLE_API_KEY` and `GOOGLE_PLACE_ID`
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var(API_KEY_ENV).unwrap_or_default(),
            place_id: std::env::var(PLACE_ID_ENV).unwrap_or_default(),
        }
    }

    /// Fills empty fields from the environment
    pub fn or_env(self) -> Self {
        if self.is_complete() {
            return self;
        }
        let env = Self::from_env();
        Self {
            api_key: if self.api_key.trim().is_empty() {
                env.api_key
            } else {
                self.api_key
            },
            place_id: if self.place_id.trim().is_empty() {
                env.place_id
            } else {
                self.place_id
            },
        }
    }

    /// True when both the key and the place id are non-blank
    pub fn is_complete(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.place_id.trim().is_empty()
    }

    /// Stable identity of this configuration, used to serialize import runs
    pub fn identity(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.place_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.api_key.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked = if self.api_key.is_empty() { "" } else { "***" };
        f.debug_struct("Credentials")
            .field("api_key", &masked)
            .field("place_id", &self.place_id)
            .finish()
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_page_delay_ms() -> u64 {
    3000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_persist_timeout() -> u64 {
    10
}

fn default_schedule_days() -> u64 {
    30
}

fn default_overdue_days() -> u64 {
    35
}

fn default_client_name() -> String {
    "review-importer".to_string()
}

fn default_client_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
