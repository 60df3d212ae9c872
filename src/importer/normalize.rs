//! Conversion of raw API reviews into testimonials

use crate::fetcher::RawReview;
use crate::storage::{ImportedRecord, REVIEW_SOURCE};
use chrono::{NaiveDate, TimeZone, Utc};

/// Number of words kept in a summary
pub const SUMMARY_WORDS: usize = 20;

/// Title used when the reviewer has no name
pub const ANONYMOUS_TITLE: &str = "Anonymous";

/// Rating recorded when the API omits one
pub const DEFAULT_RATING: &str = "5";

/// Builds the testimonial for a review
///
/// Returns `None` when the review has no usable text. `imported_on` stands in
/// for a missing or unrepresentable review timestamp.
pub fn normalize(raw: &RawReview, imported_on: NaiveDate) -> Option<ImportedRecord> {
    let body = clean_body(raw.usable_text()?);
    if body.is_empty() {
        return None;
    }

    let title = raw
        .author_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(ANONYMOUS_TITLE)
        .to_string();

    let rating_text = raw
        .rating
        .map(|r| r.to_string())
        .unwrap_or_else(|| DEFAULT_RATING.to_string());

    let date = raw
        .timestamp_seconds
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .map(|dt| dt.date_naive())
        .unwrap_or(imported_on);

    Some(ImportedRecord {
        title,
        summary: summarize(&body),
        body,
        rating_text,
        date_iso: date.format("%Y-%m-%d").to_string(),
        source: REVIEW_SOURCE.to_string(),
    })
}

/// Trims the text and drops control characters other than newlines and tabs
pub fn clean_body(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// First `SUMMARY_WORDS` words, with an ellipsis when anything was cut
pub fn summarize(body: &str) -> String {
    let words: Vec<&str> = body.split_whitespace().collect();
    if words.len() <= SUMMARY_WORDS {
        return body.to_string();
    }
    format!("{}...", words[..SUMMARY_WORDS].join(" "))
}
