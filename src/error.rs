//! Error taxonomy for the fetch/decode path.

use std::time::Duration;

use thiserror::Error;

use crate::event::Source;

/// Unified error for everything between an upstream request and a decoded batch.
///
/// `Clone` because a single in-flight attempt may be shared by any number of
/// coalesced callers; each of them receives the same outcome.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    /// The request exceeded the hard wall-clock deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection, DNS, or TLS failure before a response arrived.
    #[error("network error: {0}")]
    Network(String),

    /// The upstream answered with a non-2xx status.
    #[error("HTTP {status} {reason}")]
    HttpStatus {
        /// Status code of the response.
        status: u16,
        /// Canonical reason phrase, when known.
        reason: String,
    },

    /// The body arrived but did not match the upstream's schema.
    #[error("decode error: {0}")]
    Decode(String),

    /// Refused locally by the circuit breaker; no network attempt was made.
    #[error("circuit breaker open for {source}, no cached data")]
    BreakerOpen {
        /// The upstream whose breaker refused the request.
        source: Source,
    },

    /// Nothing could be fetched and nothing usable was cached.
    #[error("no data available: {message}")]
    NoData {
        /// Human-readable account of what was tried.
        message: String,
    },
}

impl FetchError {
    /// True for the wall-clock deadline variant.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// True when the breaker refused the request locally.
    pub fn is_breaker_open(&self) -> bool {
        matches!(self, Self::BreakerOpen { .. })
    }

    /// The HTTP status code, if this error carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}
