use crate::config::types::{ClientConfig, Config, GoogleConfig, ImportConfig, StorageConfig};
use crate::ConfigError;
use url::Url;

/// Longest accepted schedule or overdue window
pub const MAX_DAYS: u64 = 365;

/// Validates the entire configuration
///
/// Credentials are deliberately not checked here: a missing key or place id
/// is reported by the import run itself so that it lands in the run history.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_google_config(&config.google)?;
    validate_import_config(&config.import)?;
    validate_storage_config(&config.storage)?;
    validate_client_config(&config.client)?;
    Ok(())
}

fn validate_google_config(config: &GoogleConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid endpoint: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "Endpoint '{}' must use http or https",
            config.endpoint
        )));
    }

    Ok(())
}

fn validate_import_config(config: &ImportConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("request_timeout_secs", config.request_timeout_secs),
        ("connect_timeout_secs", config.connect_timeout_secs),
        ("persist_timeout_secs", config.persist_timeout_secs),
        ("schedule_interval_days", config.schedule_interval_days),
    ] {
        if value < 1 {
            return Err(ConfigError::Validation(format!(
                "{} must be >= 1, got {}",
                name, value
            )));
        }
    }

    for (name, value) in [
        ("schedule_interval_days", config.schedule_interval_days),
        ("overdue_after_days", config.overdue_after_days),
    ] {
        if value > MAX_DAYS {
            return Err(ConfigError::Validation(format!(
                "{} must be <= {}, got {}",
                name, MAX_DAYS, value
            )));
        }
    }

    if config.overdue_after_days < config.schedule_interval_days {
        return Err(ConfigError::Validation(format!(
            "overdue_after_days ({}) must not be shorter than schedule_interval_days ({})",
            config.overdue_after_days, config.schedule_interval_days
        )));
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_client_config(config: &ClientConfig) -> Result<(), ConfigError> {
    if config.name.is_empty() {
        return Err(ConfigError::Validation(
            "client name cannot be empty".to_string(),
        ));
    }

    if !config
        .name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "client name must contain only alphanumeric characters and hyphens, got '{}'",
            config.name
        )));
    }

    Ok(())
}
