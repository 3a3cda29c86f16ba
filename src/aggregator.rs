//! Cross-source aggregation: parallel fan-out, merge, dedup, ranking, and the
//! combined cache.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use serde::Serialize;

use crate::breaker::BreakerSnapshot;
use crate::breaker_registry::BreakerRegistry;
use crate::cache::{CacheSlot, SlotView};
use crate::clock::{Clock, SystemClock};
use crate::config::GatewayConfig;
use crate::error::FetchError;
use crate::event::{NormalizedEvent, Source};
use crate::fetch::HttpFetcher;
use crate::pipeline::SourcePipeline;
use crate::sources::{
    EonetAdapter, GdacsAdapter, NwsAdapter, ReliefWebAdapter, SourceAdapter, UsgsAdapter,
};
use crate::stats::{StatsCounter, StatsSnapshot};

/// Coordinate window (degrees) inside which two same-type events from
/// different sources are treated as the same incident. Deliberately coarse.
const DEDUP_WINDOW_DEGREES: f64 = 0.1;

/// One fully merged, ranked batch plus which sources contributed.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedSnapshot {
    pub events: Vec<NormalizedEvent>,
    pub sources: Vec<Source>,
}

type CombinedBatch = Arc<MergedSnapshot>;

#[derive(Debug, Clone)]
struct MergeOutcome {
    snapshot: CombinedBatch,
    stale: bool,
}

type MergeFlight = Shared<BoxFuture<'static, Result<MergeOutcome, FetchError>>>;

/// What a caller receives: the merged batch plus provenance flags.
#[derive(Debug, Clone)]
pub struct AggregateView {
    pub snapshot: CombinedBatch,
    pub from_cache: bool,
    pub stale: bool,
}

/// Per-slot introspection view: cache state plus its breaker.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStatus {
    #[serde(flatten)]
    pub cache: SlotView,
    pub breaker: BreakerSnapshot,
}

/// Full cache-status view for the introspection API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub sources: BTreeMap<Source, SourceStatus>,
    pub combined: SlotView,
}

struct AggregatorInner {
    pipelines: Vec<SourcePipeline>,
    breakers: BreakerRegistry,
    combined: CacheSlot<CombinedBatch>,
    stats: Arc<StatsCounter>,
    config: GatewayConfig,
    pending: Mutex<Option<MergeFlight>>,
}

/// The aggregation gateway's root object. All process-wide mutable state
/// (per-source caches, breakers, counters, the combined cache) hangs off one
/// of these, constructed at startup. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Aggregator {
    inner: Arc<AggregatorInner>,
}

impl Aggregator {
    /// Production aggregator over the five real upstream feeds.
    pub fn new(config: GatewayConfig) -> Result<Self, FetchError> {
        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
            Arc::new(UsgsAdapter::new()),
            Arc::new(EonetAdapter::new()),
            Arc::new(GdacsAdapter::new()?),
            Arc::new(ReliefWebAdapter::new()),
            Arc::new(NwsAdapter::new()),
        ];
        Self::with_adapters(config, Arc::new(SystemClock), adapters)
    }

    /// Aggregator over caller-supplied adapters (tests point these at mock
    /// servers). Adapter order fixes the merge arrival order.
    pub fn with_adapters(
        config: GatewayConfig,
        clock: Arc<dyn Clock>,
        adapters: Vec<Arc<dyn SourceAdapter>>,
    ) -> Result<Self, FetchError> {
        let fetcher = Arc::new(HttpFetcher::new(config.http_timeout)?);
        let stats = Arc::new(StatsCounter::new());
        let breakers =
            BreakerRegistry::new(config.breaker_threshold, config.breaker_timeout, clock.clone());
        let pipelines = adapters
            .into_iter()
            .map(|adapter| {
                let breaker = breakers.get(adapter.source());
                SourcePipeline::new(
                    adapter,
                    fetcher.clone(),
                    &config,
                    breaker,
                    stats.clone(),
                    clock.clone(),
                )
            })
            .collect();
        Ok(Self {
            inner: Arc::new(AggregatorInner {
                pipelines,
                breakers,
                combined: CacheSlot::new(config.ttl, config.stale_ttl, clock),
                stats,
                config,
                pending: Mutex::new(None),
            }),
        })
    }

    /// The merged catalog.
    ///
    /// `force` bypasses the combined-cache freshness check (and is passed down
    /// to the pipelines, where it bypasses theirs, but never an open
    /// breaker). With a `deadline`, the caller stops waiting when it expires
    /// and receives a best-effort partial assembled from the per-source
    /// caches; the in-flight fan-out keeps running and lands in the caches
    /// for later callers.
    pub async fn disasters(
        &self,
        force: bool,
        deadline: Option<Duration>,
    ) -> Result<AggregateView, FetchError> {
        match deadline {
            Some(limit) => match tokio::time::timeout(limit, self.merged(force)).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(?limit, "aggregate deadline expired, assembling partial");
                    self.partial()
                }
            },
            None => self.merged(force).await,
        }
    }

    async fn merged(&self, force: bool) -> Result<AggregateView, FetchError> {
        if !force {
            if let Some(snapshot) = self.inner.combined.fresh() {
                self.inner.stats.record_cache_hit();
                return Ok(AggregateView { snapshot, from_cache: true, stale: false });
            }
        }
        match self.join_merge_flight(force).await {
            Ok(outcome) => Ok(AggregateView {
                snapshot: outcome.snapshot,
                from_cache: outcome.stale,
                stale: outcome.stale,
            }),
            Err(err) => {
                if let Some(snapshot) = self.inner.combined.stale_usable() {
                    self.inner.stats.record_stale_serve();
                    tracing::warn!(error = %err, "fan-out failed, serving stale aggregate");
                    return Ok(AggregateView { snapshot, from_cache: true, stale: true });
                }
                Err(err)
            }
        }
    }

    fn join_merge_flight(&self, force: bool) -> MergeFlight {
        let mut pending = self.lock_pending();
        if let Some(flight) = pending.as_ref() {
            return flight.clone();
        }
        let this = self.clone();
        let handle = tokio::spawn(async move { this.run_merge(force).await });
        let flight: MergeFlight = async move {
            handle
                .await
                .unwrap_or_else(|e| Err(FetchError::Network(format!("merge task failed: {e}"))))
        }
        .boxed()
        .shared();
        *pending = Some(flight.clone());
        flight
    }

    async fn run_merge(&self, force: bool) -> Result<MergeOutcome, FetchError> {
        let result = self.merge_once(force).await;
        *self.lock_pending() = None;
        result
    }

    /// Dispatch every pipeline concurrently, wait for all of them, and fold
    /// whatever succeeded. Never fail-fast: a failed source is logged and
    /// skipped.
    async fn merge_once(&self, force: bool) -> Result<MergeOutcome, FetchError> {
        let handles: Vec<_> = self
            .inner
            .pipelines
            .iter()
            .map(|pipeline| {
                let pipeline = pipeline.clone();
                tokio::spawn(async move { (pipeline.source(), pipeline.events(force).await) })
            })
            .collect();
        let settled = futures::future::join_all(handles).await;

        let mut events = Vec::new();
        let mut sources = Vec::new();
        let mut failures = 0usize;
        for joined in settled {
            match joined {
                Ok((source, Ok(batch))) => {
                    sources.push(source);
                    events.extend(batch.events.iter().cloned());
                }
                Ok((source, Err(err))) => {
                    failures += 1;
                    tracing::warn!(%source, error = %err, "source failed during fan-out");
                }
                Err(err) => {
                    failures += 1;
                    tracing::warn!(error = %err, "source task aborted during fan-out");
                }
            }
        }

        let mut merged = dedupe_across_sources(events);
        rank(&mut merged);
        assign_sequence_ids(&mut merged);
        tracing::debug!(
            kept = merged.len(),
            sources = sources.len(),
            failures,
            "fan-out merged"
        );

        if merged.is_empty() {
            // Stale fallback of last resort. The empty result is not stored:
            // storing would re-freshen the combined slot.
            if let Some(snapshot) = self.inner.combined.stale_usable() {
                self.inner.stats.record_stale_serve();
                tracing::warn!("empty merge, serving stale aggregate");
                return Ok(MergeOutcome { snapshot, stale: true });
            }
            if sources.is_empty() {
                return Err(FetchError::NoData {
                    message: format!("all {failures} sources failed and no cached aggregate"),
                });
            }
        }

        let snapshot = Arc::new(MergedSnapshot { events: merged, sources });
        self.inner.combined.store(snapshot.clone(), snapshot.events.len());
        Ok(MergeOutcome { snapshot, stale: false })
    }

    /// Best-effort result from whatever the per-source caches hold right now.
    fn partial(&self) -> Result<AggregateView, FetchError> {
        let mut events = Vec::new();
        let mut sources = Vec::new();
        for pipeline in &self.inner.pipelines {
            if let Some(batch) = pipeline.cached_any() {
                sources.push(pipeline.source());
                events.extend(batch.iter().cloned());
            }
        }
        if events.is_empty() {
            if let Some(snapshot) = self.inner.combined.stale_usable() {
                self.inner.stats.record_stale_serve();
                return Ok(AggregateView { snapshot, from_cache: true, stale: true });
            }
            return Err(FetchError::NoData {
                message: "deadline expired before any source produced data".to_string(),
            });
        }
        let mut merged = dedupe_across_sources(events);
        rank(&mut merged);
        assign_sequence_ids(&mut merged);
        let snapshot = Arc::new(MergedSnapshot { events: merged, sources });
        Ok(AggregateView { snapshot, from_cache: true, stale: true })
    }

    // Introspection and operator surface.

    pub fn cache_status(&self) -> CacheStatus {
        let sources = self
            .inner
            .pipelines
            .iter()
            .map(|pipeline| {
                (
                    pipeline.source(),
                    SourceStatus {
                        cache: pipeline.cache_view(),
                        breaker: pipeline.breaker_snapshot(),
                    },
                )
            })
            .collect();
        CacheStatus { sources, combined: self.inner.combined.view() }
    }

    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    /// Clear one source's cache, or every cache (including the combined one).
    pub fn clear_cache(&self, source: Option<Source>) {
        match source {
            Some(source) => {
                for pipeline in &self.inner.pipelines {
                    if pipeline.source() == source {
                        pipeline.clear_cache();
                    }
                }
            }
            None => {
                for pipeline in &self.inner.pipelines {
                    pipeline.clear_cache();
                }
                self.inner.combined.clear();
                tracing::info!("all caches cleared");
            }
        }
    }

    /// Reset one breaker, or all of them.
    pub fn reset_breakers(&self, source: Option<Source>) {
        match source {
            Some(source) => self.inner.breakers.reset(source),
            None => self.inner.breakers.reset_all(),
        }
    }

    pub fn reset_stats(&self) {
        self.inner.stats.reset();
        tracing::info!("stats reset");
    }

    /// Compact health view: per-source breaker state and cache item counts.
    pub fn health(&self) -> serde_json::Value {
        let mut sources = serde_json::Map::new();
        for pipeline in &self.inner.pipelines {
            let view = pipeline.cache_view();
            sources.insert(
                pipeline.source().name().to_string(),
                serde_json::json!({
                    "breaker": pipeline.breaker_snapshot().state,
                    "items": view.item_count,
                    "ageSeconds": view.age_seconds,
                }),
            );
        }
        serde_json::json!({
            "status": "ok",
            "timestamp": Utc::now().to_rfc3339(),
            "sources": sources,
            "combinedItems": self.inner.combined.view().item_count,
        })
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Option<MergeFlight>> {
        self.inner.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Drop an event when an earlier-kept event has the same type and both
/// coordinate deltas are inside the dedup window. Arrival order is preserved;
/// the output is always a subsequence of the input.
pub fn dedupe_across_sources(events: Vec<NormalizedEvent>) -> Vec<NormalizedEvent> {
    let mut kept: Vec<NormalizedEvent> = Vec::with_capacity(events.len());
    for event in events {
        let duplicate = kept.iter().any(|earlier| {
            earlier.event_type == event.event_type
                && (earlier.lat - event.lat).abs() < DEDUP_WINDOW_DEGREES
                && (earlier.lng - event.lng).abs() < DEDUP_WINDOW_DEGREES
        });
        if !duplicate {
            kept.push(event);
        }
    }
    kept
}

/// Sort by severity (worst first), then by timestamp (newest first).
pub fn rank(events: &mut [NormalizedEvent]) {
    events.sort_by(|a, b| {
        b.severity.cmp(&a.severity).then_with(|| b.timestamp.cmp(&a.timestamp))
    });
}

/// Number the ranked batch 1..=N.
pub fn assign_sequence_ids(events: &mut [NormalizedEvent]) {
    for (index, event) in events.iter_mut().enumerate() {
        event.sequence_id = index as u64 + 1;
    }
}
