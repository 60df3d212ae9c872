//! Place Details request URLs and response model
//!
//! Responses look like
//! `{"status": "OK", "result": {"reviews": [...]}, "next_page_token": "..."}`.
//! Every field is optional on the wire; absence carries meaning (no
//! `reviews` means the place has no reviews, no token means the last page).

use crate::config::Credentials;
use serde::Deserialize;
use url::Url;

/// Fields requested while importing
pub const REVIEW_FIELDS: &str = "reviews,next_page_token";

/// Minimal fields requested by the health probe
pub const PROBE_FIELDS: &str = "name";

/// Fields requested by the API diagnostic
pub const CHECK_FIELDS: &str = "name,rating";

/// Status value of a successful response
pub const STATUS_OK: &str = "OK";

/// Builds a Place Details URL
///
/// Query values are percent-encoded, so tokens and keys containing reserved
/// characters survive intact.
pub fn details_url(
    endpoint: &str,
    credentials: &Credentials,
    fields: &str,
    page_token: Option<&str>,
) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(endpoint)?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("place_id", &credentials.place_id)
            .append_pair("fields", fields)
            .append_pair("key", &credentials.api_key);
        if let Some(token) = page_token {
            query.append_pair("pagetoken", token);
        }
    }
    Ok(url)
}

/// Top-level Place Details response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetailsResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub result: Option<PlaceResult>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl DetailsResponse {
    pub fn parse(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    /// Error text when `status` is present and not `OK`
    ///
    /// Prefers the API's `error_message`, falling back to the status code.
    pub fn api_error(&self) -> Option<String> {
        match self.status.as_deref() {
            Some(status) if status != STATUS_OK => Some(
                self.error_message
                    .clone()
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| status.to_string()),
            ),
            _ => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status.as_deref() == Some(STATUS_OK)
    }

    /// Continuation token, accepted at the top level or inside `result`
    pub fn next_page_token(&self) -> Option<&str> {
        self.next_page_token
            .as_deref()
            .or_else(|| {
                self.result
                    .as_ref()
                    .and_then(|r| r.next_page_token.as_deref())
            })
            .filter(|t| !t.is_empty())
    }
}

/// The `result` object
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaceResult {
    #[serde(default)]
    pub reviews: Option<Vec<RawReview>>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
}

/// A review exactly as the API returned it
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawReview {
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub rating: Option<i64>,
    /// Unix seconds
    #[serde(rename = "time", default)]
    pub timestamp_seconds: Option<i64>,
}

impl RawReview {
    /// Trimmed review text, or `None` when missing or blank
    pub fn usable_text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}
