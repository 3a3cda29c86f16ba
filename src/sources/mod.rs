//! Source adapters: one self-contained decoder per upstream feed.
//!
//! An adapter owns its upstream's URLs, request headers, and the mapping from
//! that provider's schema into [`NormalizedEvent`]s. Fetching is the
//! pipeline's job; adapters only describe endpoints and decode bodies.

mod eonet;
mod gdacs;
mod nws;
mod reliefweb;
mod usgs;

pub use eonet::EonetAdapter;
pub use gdacs::GdacsAdapter;
pub use nws::NwsAdapter;
pub use reliefweb::ReliefWebAdapter;
pub use usgs::UsgsAdapter;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;

use crate::error::FetchError;
use crate::event::{NormalizedEvent, Source};

/// One upstream request an adapter wants issued.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl Endpoint {
    /// An endpoint with no extra headers.
    pub fn bare(url: impl Into<String>) -> Self {
        Self { url: url.into(), headers: Vec::new() }
    }

    /// Attach a request header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Decoder for one upstream provider.
pub trait SourceAdapter: Send + Sync {
    /// Which upstream this adapter covers.
    fn source(&self) -> Source;

    /// The requests to issue, in order. Most adapters have one; USGS has two.
    fn endpoints(&self) -> Vec<Endpoint>;

    /// Turn the response bodies (one per endpoint, same order) into events.
    fn decode(&self, bodies: &[Vec<u8>]) -> Result<Vec<NormalizedEvent>, FetchError>;
}

/// Deserialize a JSON body, mapping failures into the decode error kind.
pub(crate) fn body_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, FetchError> {
    serde_json::from_slice(body).map_err(|e| FetchError::Decode(e.to_string()))
}

/// Lenient timestamp parse covering the shapes the five feeds actually emit:
/// RFC 3339, RFC 2822 (RSS pubDate), minute-precision ISO, and bare dates.
/// Anything unparsable falls back to the given instant (fetch time).
pub(crate) fn parse_instant(raw: &str, fallback: DateTime<Utc>) -> DateTime<Utc> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return fallback;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return parsed.with_timezone(&Utc);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc2822(trimmed) {
        return parsed.with_timezone(&Utc);
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%MZ") {
        return parsed.and_utc();
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return parsed.and_utc();
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(midnight) = parsed.and_hms_opt(0, 0, 0) {
            return midnight.and_utc();
        }
    }
    fallback
}
