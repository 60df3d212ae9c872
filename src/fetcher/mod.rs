//! Fetcher module for talking to the Place Details API
//!
//! This module contains:
//! - The `HttpFetcher` seam and its reqwest implementation
//! - Request URLs and the serde model of responses
//! - Pagination across continuation tokens with the mandatory page delay
//! - Connectivity probes used by the health view and the API diagnostic

pub mod api;
mod http;
mod pagination;
mod probe;

pub use api::{DetailsResponse, PlaceResult, RawReview};
pub use http::{build_http_client, HttpFetcher, ReqwestFetcher, TransportError};
pub use pagination::{fetch_details, FetchError, FetchedReviews, PaginationWalker};
pub use probe::{check_api, probe_api, ApiCheck, ApiProbe, CheckFailure};
