//! Process-wide fetch counters.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

use crate::error::FetchError;
use crate::event::Source;

/// Per-source outcome tallies.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStats {
    pub successes: u64,
    pub failures: u64,
    pub last_error: Option<String>,
}

/// Point-in-time view of every counter.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub total_fetches: u64,
    pub cache_hits: u64,
    pub stale_serves: u64,
    pub successful_fetches: u64,
    pub retry_successes: u64,
    pub sources: BTreeMap<Source, SourceStats>,
}

/// Process-wide counters, shared by every pipeline and the aggregator.
#[derive(Debug, Default)]
pub struct StatsCounter {
    total_fetches: AtomicU64,
    cache_hits: AtomicU64,
    stale_serves: AtomicU64,
    successful_fetches: AtomicU64,
    retry_successes: AtomicU64,
    sources: Mutex<BTreeMap<Source, SourceStats>>,
}

impl StatsCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A network flight was launched (coalesced joiners do not count).
    pub fn record_fetch(&self) {
        self.total_fetches.fetch_add(1, Ordering::Relaxed);
    }

    /// A caller was served straight from a fresh cache slot.
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// A caller was served stale data after a failed or refused fetch.
    pub fn record_stale_serve(&self) {
        self.stale_serves.fetch_add(1, Ordering::Relaxed);
    }

    /// A flight succeeded for the given source.
    pub fn record_success(&self, source: Source) {
        self.successful_fetches.fetch_add(1, Ordering::Relaxed);
        self.lock_sources().entry(source).or_default().successes += 1;
    }

    /// A flight failed for the given source; keeps the last error message.
    pub fn record_failure(&self, source: Source, error: &FetchError) {
        let mut sources = self.lock_sources();
        let entry = sources.entry(source).or_default();
        entry.failures += 1;
        entry.last_error = Some(error.to_string());
    }

    /// A fetch succeeded after at least one retry.
    pub fn record_retry_success(&self) {
        self.retry_successes.fetch_add(1, Ordering::Relaxed);
    }

    /// Zero every counter.
    pub fn reset(&self) {
        self.total_fetches.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.stale_serves.store(0, Ordering::Relaxed);
        self.successful_fetches.store(0, Ordering::Relaxed);
        self.retry_successes.store(0, Ordering::Relaxed);
        self.lock_sources().clear();
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_fetches: self.total_fetches.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            stale_serves: self.stale_serves.load(Ordering::Relaxed),
            successful_fetches: self.successful_fetches.load(Ordering::Relaxed),
            retry_successes: self.retry_successes.load(Ordering::Relaxed),
            sources: self.lock_sources().clone(),
        }
    }

    /// Current stale-serve count, handy for tests.
    pub fn stale_serves(&self) -> u64 {
        self.stale_serves.load(Ordering::Relaxed)
    }

    /// Current launched-flight count, handy for tests.
    pub fn total_fetches(&self) -> u64 {
        self.total_fetches.load(Ordering::Relaxed)
    }

    fn lock_sources(&self) -> MutexGuard<'_, BTreeMap<Source, SourceStats>> {
        self.sources.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = StatsCounter::new();
        stats.record_fetch();
        stats.record_fetch();
        stats.record_cache_hit();
        stats.record_stale_serve();
        stats.record_retry_success();
        stats.record_success(Source::Usgs);
        stats.record_failure(Source::Gdacs, &FetchError::Network("refused".into()));

        let snap = stats.snapshot();
        assert_eq!(snap.total_fetches, 2);
        assert_eq!(snap.cache_hits, 1);
        assert_eq!(snap.stale_serves, 1);
        assert_eq!(snap.successful_fetches, 1);
        assert_eq!(snap.retry_successes, 1);
        assert_eq!(snap.sources[&Source::Usgs].successes, 1);
        assert_eq!(snap.sources[&Source::Gdacs].failures, 1);
        assert_eq!(
            snap.sources[&Source::Gdacs].last_error.as_deref(),
            Some("network error: refused")
        );
    }

    #[test]
    fn reset_zeroes_everything() {
        let stats = StatsCounter::new();
        stats.record_fetch();
        stats.record_success(Source::Nws);
        stats.reset();
        let snap = stats.snapshot();
        assert_eq!(snap.total_fetches, 0);
        assert_eq!(snap.successful_fetches, 0);
        assert!(snap.sources.is_empty());
    }

    #[test]
    fn snapshot_serializes_sources_by_name() {
        let stats = StatsCounter::new();
        stats.record_success(Source::NasaEonet);
        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(json["sources"]["NASA EONET"]["successes"], 1);
        assert_eq!(json["totalFetches"], 0);
    }
}
