//! Page-by-page retrieval of a place's reviews
//!
//! Pages are requested strictly in sequence: each request needs the
//! continuation token of the previous one, and the API only honours a token
//! after a short propagation delay. Any failure aborts the whole walk so a
//! caller never sees a partial review set.

use crate::config::Credentials;
use crate::fetcher::api::{details_url, DetailsResponse, RawReview, REVIEW_FIELDS};
use crate::fetcher::http::{HttpFetcher, TransportError};
use std::time::Duration;
use thiserror::Error;

/// Why a Place Details request produced no usable response
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// The API answered with a non-OK status
    #[error("{message}")]
    Api { status: String, message: String },

    /// The body was not a Place Details JSON document
    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Issues one Place Details request bounded by `timeout` and parses the body
///
/// A non-OK `status` is returned as `FetchError::Api`.
pub async fn fetch_details(
    fetcher: &dyn HttpFetcher,
    endpoint: &str,
    credentials: &Credentials,
    fields: &str,
    page_token: Option<&str>,
    timeout: Duration,
) -> Result<DetailsResponse, FetchError> {
    let url = details_url(endpoint, credentials, fields, page_token)
        .map_err(|e| TransportError::new(format!("Invalid request URL: {}", e)))?;

    let body = tokio::time::timeout(timeout, fetcher.get(url.as_str()))
        .await
        .map_err(|_| TransportError::timed_out(timeout.as_secs()))??;

    let response =
        DetailsResponse::parse(&body).map_err(|e| FetchError::Malformed(e.to_string()))?;

    if let Some(message) = response.api_error() {
        return Err(FetchError::Api {
            status: response.status.unwrap_or_default(),
            message,
        });
    }

    Ok(response)
}

/// Everything gathered by one complete walk
#[derive(Debug, Clone, Default)]
pub struct FetchedReviews {
    pub reviews: Vec<RawReview>,
    pub pages_fetched: usize,
    /// False when the walk ended on a page without a `reviews` field
    pub reviews_present: bool,
}

/// Drives the fetcher across result pages
pub struct PaginationWalker<'a> {
    fetcher: &'a dyn HttpFetcher,
    endpoint: &'a str,
    page_delay: Duration,
    request_timeout: Duration,
}

impl<'a> PaginationWalker<'a> {
    pub fn new(
        fetcher: &'a dyn HttpFetcher,
        endpoint: &'a str,
        page_delay: Duration,
        request_timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            endpoint,
            page_delay,
            request_timeout,
        }
    }

    /// Fetches every page of reviews for the configured place
    ///
    /// # Request Flow
    ///
    /// 1. Request `reviews,next_page_token` for the place
    /// 2. Abort on transport failure, malformed body, or non-OK status
    /// 3. Stop when a page has no `reviews` field; the walk then ends with
    ///    zero reviews, even if earlier pages had some
    /// 4. Otherwise collect the page and, if a token came back, wait the
    ///    page delay and request the next page with it
    ///
    /// A token the API keeps rejecting is not retried: the resulting non-OK
    /// status ends the walk like any other API error.
    pub async fn fetch_all_pages(
        &self,
        credentials: &Credentials,
    ) -> Result<FetchedReviews, FetchError> {
        let mut fetched = FetchedReviews::default();
        let mut page_token: Option<String> = None;

        loop {
            if let Some(token) = &page_token {
                tracing::debug!(
                    "Waiting {}ms before requesting page {}",
                    self.page_delay.as_millis(),
                    fetched.pages_fetched + 1
                );
                tokio::time::sleep(self.page_delay).await;
                tracing::trace!("Using continuation token {}", token);
            }

            let response = fetch_details(
                self.fetcher,
                self.endpoint,
                credentials,
                REVIEW_FIELDS,
                page_token.as_deref(),
                self.request_timeout,
            )
            .await?;
            fetched.pages_fetched += 1;

            let next_token = response.next_page_token().map(str::to_string);

            let Some(page) = response.result.and_then(|result| result.reviews) else {
                tracing::debug!("Page {} has no reviews field", fetched.pages_fetched);
                fetched.reviews.clear();
                fetched.reviews_present = false;
                break;
            };

            tracing::debug!(
                "Page {} returned {} reviews",
                fetched.pages_fetched,
                page.len()
            );
            fetched.reviews_present = true;
            fetched.reviews.extend(page);

            match next_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(fetched)
    }
}
