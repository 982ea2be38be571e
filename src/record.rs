use crate::vendor::Vendor;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The normalized advisory handed to the sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisoryRecord {
    pub title: String,
    pub short_description: String,
    pub full_text: String,
    pub vendor: Vendor,
    /// `%Y-%m-%d %H:%M:%S`, UTC.
    pub published_at: String,
    /// Date header exactly as received.
    pub raw_date: String,
    pub alias: String,
}

/// Parses an RFC 822 date header. Malformed or missing dates fall back to now.
pub fn normalize_date(raw: &str) -> String {
    normalize_date_at(raw, Utc::now())
}

pub fn normalize_date_at(raw: &str, now: DateTime<Utc>) -> String {
    let cleaned = raw.replace(['\r', '\n'], "");
    let parsed = mailparse::dateparse(cleaned.trim())
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
    match parsed {
        Some(dt) => dt.format(TIMESTAMP_FORMAT).to_string(),
        None => {
            log::warn!("Could not parse date '{}', using current time", raw);
            now.format(TIMESTAMP_FORMAT).to_string()
        }
    }
}
