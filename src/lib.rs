#![forbid(unsafe_code)]

//! # hazardgate
//!
//! Read-through aggregation gateway that merges five public disaster feeds
//! (USGS earthquakes, NASA EONET, GDACS alerts, ReliefWeb crises, NWS weather
//! alerts) into one normalized, de-duplicated, severity-ranked event catalog.
//!
//! The interesting part is the upstream fan-out and resilience layer:
//!
//! - per-source TTL caches with a stale-while-revalidate fallback window
//! - bounded retries with exponential backoff
//! - one circuit breaker per upstream, with implicit half-open probing
//! - single-flight request coalescing per source and for the merged batch
//! - parallel fan-out that tolerates partial failure
//! - five schema decoders producing one uniform event shape
//! - cross-source de-duplication and severity ranking
//!
//! The HTTP surface ([`server`]) is a thin axum layer over an [`Aggregator`]
//! value constructed at startup; all mutable state hangs off it explicitly.
//!
//! ```no_run
//! use std::sync::Arc;
//! use hazardgate::{Aggregator, GatewayConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), hazardgate::FetchError> {
//!     let aggregator = Arc::new(Aggregator::new(GatewayConfig::default())?);
//!     let view = aggregator.disasters(false, None).await?;
//!     println!("{} active events", view.snapshot.events.len());
//!     Ok(())
//! }
//! ```

mod aggregator;
mod backoff;
mod breaker;
mod breaker_registry;
mod cache;
mod clock;
mod config;
mod error;
mod event;
mod fetch;
mod pipeline;
mod retry;
pub mod safe_zones;
pub mod server;
mod sleeper;
pub mod sources;
mod stats;

pub use aggregator::{
    assign_sequence_ids, dedupe_across_sources, rank, AggregateView, Aggregator, CacheStatus,
    MergedSnapshot, SourceStatus,
};
pub use backoff::Backoff;
pub use breaker::{BreakerSnapshot, BreakerState, CircuitBreaker};
pub use breaker_registry::BreakerRegistry;
pub use cache::{CacheSlot, SlotView};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::GatewayConfig;
pub use error::FetchError;
pub use event::{clamp_severity, coords_in_range, EventType, NormalizedEvent, Source};
pub use fetch::HttpFetcher;
pub use pipeline::{EventsBatch, SourceBatch, SourcePipeline};
pub use retry::{Attempted, RetryPolicy};
pub use sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper};
pub use stats::{SourceStats, StatsCounter, StatsSnapshot};
