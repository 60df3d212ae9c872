//! Connectivity checks against the Place Details API
//!
//! Two flavours share one request path: the health view's minimal probe and
//! the command-line diagnostic, which also reports the place's name and
//! rating.

use crate::config::Credentials;
use crate::fetcher::api::{CHECK_FIELDS, PROBE_FIELDS};
use crate::fetcher::http::{HttpFetcher, TransportError};
use crate::fetcher::pagination::{fetch_details, FetchError};
use std::fmt;
use std::time::Duration;

/// Result of the health view's live probe
#[derive(Debug, Clone, PartialEq)]
pub enum ApiProbe {
    /// The API answered with status OK
    Reachable,
    /// Transport failure or non-OK status, with its message
    Error(String),
    /// No probe was attempted because credentials are incomplete
    NotConfigured,
}

impl ApiProbe {
    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::Reachable)
    }
}

/// Issues one minimal request and classifies the outcome
///
/// This performs live network I/O on every call (bounded by `timeout`);
/// nothing is cached.
pub async fn probe_api(
    fetcher: &dyn HttpFetcher,
    endpoint: &str,
    credentials: &Credentials,
    timeout: Duration,
) -> ApiProbe {
    if !credentials.is_complete() {
        return ApiProbe::NotConfigured;
    }

    match fetch_details(fetcher, endpoint, credentials, PROBE_FIELDS, None, timeout).await {
        Ok(response) if response.is_ok() => ApiProbe::Reachable,
        Ok(_) => ApiProbe::Error("Unknown".to_string()),
        Err(e) => ApiProbe::Error(e.to_string()),
    }
}

/// What the diagnostic learned about the place
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCheck {
    pub place_name: String,
    pub rating: Option<f64>,
}

/// Why the diagnostic failed
#[derive(Debug, Clone, PartialEq)]
pub enum CheckFailure {
    MissingApiKey,
    MissingPlaceId,
    Transport(TransportError),
    Api {
        status: Option<String>,
        message: String,
    },
}

impl CheckFailure {
    /// Extra guidance for failures with a well-known cause
    pub fn hint(&self) -> Option<&'static [&'static str]> {
        match self {
            Self::Api {
                status: Some(status),
                ..
            } if status == "REQUEST_DENIED" => Some(&[
                "This usually indicates an issue with your API key. Please check:",
                "1. The API key is correct",
                "2. The Places API is enabled in your Google Cloud Console",
                "3. Any API restrictions (HTTP referrers, IP addresses) are correctly configured",
            ]),
            _ => None,
        }
    }
}

impl fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingApiKey => write!(f, "API key not configured."),
            Self::MissingPlaceId => write!(f, "Place ID not configured."),
            Self::Transport(e) => write!(f, "API Connection Error: {}", e),
            Self::Api { message, .. } => write!(f, "API Error: {}", message),
        }
    }
}

/// Runs the API diagnostic
///
/// Succeeds only when the API answers with status `OK`.
pub async fn check_api(
    fetcher: &dyn HttpFetcher,
    endpoint: &str,
    credentials: &Credentials,
    timeout: Duration,
) -> Result<ApiCheck, CheckFailure> {
    if credentials.api_key.trim().is_empty() {
        return Err(CheckFailure::MissingApiKey);
    }
    if credentials.place_id.trim().is_empty() {
        return Err(CheckFailure::MissingPlaceId);
    }

    let response = fetch_details(fetcher, endpoint, credentials, CHECK_FIELDS, None, timeout)
        .await
        .map_err(|e| match e {
            FetchError::Transport(t) => CheckFailure::Transport(t),
            FetchError::Api { status, message } => CheckFailure::Api {
                status: Some(status),
                message,
            },
            FetchError::Malformed(message) => CheckFailure::Api {
                status: None,
                message,
            },
        })?;

    if !response.is_ok() {
        return Err(CheckFailure::Api {
            status: response.status.clone(),
            message: "Unknown error".to_string(),
        });
    }

    let result = response.result.unwrap_or_default();
    Ok(ApiCheck {
        place_name: result.name.unwrap_or_else(|| "Unknown".to_string()),
        rating: result.rating,
    })
}
