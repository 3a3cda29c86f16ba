//! Per-source fetch pipeline: cache consultation, breaker gate, and the
//! single-flight fetch.
//!
//! Decision procedure on every request:
//!
//! 1. Not forced and the slot is fresh → serve cached, count a cache hit.
//! 2. Breaker blocked (open, recovery window not elapsed) → serve cached data
//!    of any age if present, else fail with `BreakerOpen`. A forced refresh
//!    does not override this step.
//! 3. Otherwise join (or launch) the single in-flight fetch.
//! 4. On fetch failure, fall back to stale-usable cached data, counting a
//!    stale serve; else propagate the error.
//!
//! Single-flight is a coalescing slot holding a [`Shared`] future: the first
//! caller spawns the fetch as a detached tokio task, every concurrent caller
//! clones the same future, and the spawned task writes cache/breaker/stats on
//! completion even when all callers have abandoned it.

use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;

use crate::backoff::Backoff;
use crate::breaker::{BreakerSnapshot, CircuitBreaker};
use crate::cache::{CacheSlot, SlotView};
use crate::clock::Clock;
use crate::config::GatewayConfig;
use crate::error::FetchError;
use crate::event::{NormalizedEvent, Source};
use crate::fetch::HttpFetcher;
use crate::retry::RetryPolicy;
use crate::sleeper::Sleeper;
use crate::sources::SourceAdapter;
use crate::stats::StatsCounter;

/// A decoded batch, shared without copying between cache and callers.
pub type EventsBatch = Arc<Vec<NormalizedEvent>>;

type Flight = Shared<BoxFuture<'static, Result<EventsBatch, FetchError>>>;

/// A batch together with its provenance.
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub source: Source,
    pub events: EventsBatch,
    /// Served from the cache rather than a fetch completed for this call.
    pub from_cache: bool,
    /// Served past the TTL (stale fallback or breaker-open fallback).
    pub stale: bool,
}

struct PipelineInner {
    adapter: Arc<dyn SourceAdapter>,
    fetcher: Arc<HttpFetcher>,
    retry: RetryPolicy,
    breaker: Arc<CircuitBreaker>,
    cache: CacheSlot<EventsBatch>,
    stats: Arc<StatsCounter>,
    pending: Mutex<Option<Flight>>,
}

/// Fetch pipeline for one upstream source. Cheap to clone; clones share all
/// state, so the spawned fetch task is just another handle.
#[derive(Clone)]
pub struct SourcePipeline {
    inner: Arc<PipelineInner>,
}

impl SourcePipeline {
    pub fn new(
        adapter: Arc<dyn SourceAdapter>,
        fetcher: Arc<HttpFetcher>,
        config: &GatewayConfig,
        breaker: Arc<CircuitBreaker>,
        stats: Arc<StatsCounter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(PipelineInner {
                adapter,
                fetcher,
                retry: RetryPolicy::new(
                    config.retry_attempts,
                    Backoff::exponential(config.retry_base_delay),
                ),
                breaker,
                cache: CacheSlot::new(config.ttl, config.stale_ttl, clock),
                stats,
                pending: Mutex::new(None),
            }),
        }
    }

    /// Replace the retry sleeper, for deterministic tests. Only effective
    /// before the pipeline has been cloned.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.retry = inner.retry.clone().with_sleeper(sleeper);
        }
        self
    }

    pub fn source(&self) -> Source {
        self.inner.adapter.source()
    }

    /// The decision procedure described at module level.
    pub async fn events(&self, force: bool) -> Result<SourceBatch, FetchError> {
        let source = self.source();

        if !force {
            if let Some(events) = self.inner.cache.fresh() {
                self.inner.stats.record_cache_hit();
                return Ok(SourceBatch { source, events, from_cache: true, stale: false });
            }
        }

        if self.inner.breaker.is_blocked() {
            if let Some(events) = self.inner.cache.any() {
                tracing::debug!(%source, "breaker open, serving cached data");
                return Ok(SourceBatch { source, events, from_cache: true, stale: true });
            }
            return Err(FetchError::BreakerOpen { source });
        }

        match self.join_flight().await {
            Ok(events) => Ok(SourceBatch { source, events, from_cache: false, stale: false }),
            Err(err) => {
                if let Some(events) = self.inner.cache.stale_usable() {
                    self.inner.stats.record_stale_serve();
                    tracing::warn!(%source, error = %err, "fetch failed, serving stale data");
                    return Ok(SourceBatch { source, events, from_cache: true, stale: true });
                }
                Err(err)
            }
        }
    }

    /// The cached batch regardless of age, for the aggregator's partial path.
    pub fn cached_any(&self) -> Option<EventsBatch> {
        self.inner.cache.any()
    }

    pub fn cache_view(&self) -> SlotView {
        self.inner.cache.view()
    }

    pub fn breaker_snapshot(&self) -> BreakerSnapshot {
        self.inner.breaker.snapshot()
    }

    pub fn clear_cache(&self) {
        self.inner.cache.clear();
        tracing::info!(source = %self.source(), "cache cleared");
    }

    /// Join the in-flight fetch, or launch one if none is pending.
    fn join_flight(&self) -> Flight {
        let mut pending = self.lock_pending();
        if let Some(flight) = pending.as_ref() {
            return flight.clone();
        }
        let this = self.clone();
        let handle = tokio::spawn(async move { this.run_flight().await });
        let flight: Flight = async move {
            handle
                .await
                .unwrap_or_else(|e| Err(FetchError::Network(format!("fetch task failed: {e}"))))
        }
        .boxed()
        .shared();
        *pending = Some(flight.clone());
        flight
    }

    /// One complete fetch attempt: network (with retries) → decode → record.
    async fn run_flight(&self) -> Result<EventsBatch, FetchError> {
        let source = self.source();
        self.inner.stats.record_fetch();
        let result = self.fetch_and_decode().await;
        match &result {
            Ok(events) => {
                self.inner.breaker.on_success();
                self.inner.stats.record_success(source);
                self.inner.cache.store(events.clone(), events.len());
                tracing::info!(%source, count = events.len(), "fetched and decoded");
            }
            Err(err) => {
                self.inner.breaker.on_failure();
                self.inner.stats.record_failure(source, err);
                tracing::warn!(%source, error = %err, "fetch failed");
            }
        }
        *self.lock_pending() = None;
        result
    }

    async fn fetch_and_decode(&self) -> Result<EventsBatch, FetchError> {
        let endpoints = self.inner.adapter.endpoints();
        let requests = endpoints.iter().map(|endpoint| {
            self.inner
                .retry
                .execute(move || self.inner.fetcher.get(&endpoint.url, &endpoint.headers))
        });
        let outcomes = futures::future::try_join_all(requests).await?;

        let mut bodies = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            if outcome.attempts >= 2 {
                self.inner.stats.record_retry_success();
            }
            bodies.push(outcome.value);
        }
        let events = self.inner.adapter.decode(&bodies)?;
        Ok(Arc::new(events))
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Option<Flight>> {
        self.inner.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
