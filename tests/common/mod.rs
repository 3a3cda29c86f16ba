#![allow(dead_code)]

//! Shared fixtures: a stub source adapter speaking a trivial JSON shape, and
//! helpers wiring pipelines/aggregators to a wiremock server.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use hazardgate::sources::{Endpoint, SourceAdapter};
use hazardgate::{
    Aggregator, CircuitBreaker, EventType, FetchError, GatewayConfig, HttpFetcher, InstantSleeper,
    ManualClock, NormalizedEvent, Source, SourcePipeline, StatsCounter,
};

/// Minimal upstream schema for tests: a JSON array of flat event specs.
#[derive(Debug, Deserialize)]
struct StubEvent {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    severity: u8,
    lat: f64,
    lng: f64,
    #[serde(default)]
    ts: Option<DateTime<Utc>>,
}

/// Adapter decoding the stub schema, pointed at a mock server.
pub struct StubAdapter {
    source: Source,
    url: String,
}

impl StubAdapter {
    pub fn new(source: Source, url: impl Into<String>) -> Self {
        Self { source, url: url.into() }
    }
}

impl SourceAdapter for StubAdapter {
    fn source(&self) -> Source {
        self.source
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        vec![Endpoint::bare(&self.url)]
    }

    fn decode(&self, bodies: &[Vec<u8>]) -> Result<Vec<NormalizedEvent>, FetchError> {
        let body = bodies.first().map(Vec::as_slice).unwrap_or_default();
        let stubs: Vec<StubEvent> =
            serde_json::from_slice(body).map_err(|e| FetchError::Decode(e.to_string()))?;
        Ok(stubs
            .into_iter()
            .map(|stub| NormalizedEvent {
                sequence_id: 0,
                source_id: stub.id,
                source: self.source,
                event_type: kind(&stub.kind),
                severity: stub.severity,
                lat: stub.lat,
                lng: stub.lng,
                radius: 10_000,
                location: "Stubville".to_string(),
                description: String::new(),
                timestamp: stub.ts.unwrap_or_else(Utc::now),
                url: None,
                magnitude: None,
                alert_level: None,
                expires: None,
                status: None,
            })
            .collect())
    }
}

fn kind(name: &str) -> EventType {
    match name {
        "earthquake" => EventType::Earthquake,
        "flood" => EventType::Flood,
        "wildfire" => EventType::Wildfire,
        "hurricane" => EventType::Hurricane,
        "tornado" => EventType::Tornado,
        "snow" => EventType::Snow,
        _ => EventType::Other,
    }
}

/// Config with single-attempt fetches, so failure tests stay request-exact.
pub fn test_config() -> GatewayConfig {
    GatewayConfig { retry_attempts: 1, ..GatewayConfig::default() }
}

/// A pipeline plus handles to its clock, stats, and breaker.
pub struct TestPipeline {
    pub pipeline: SourcePipeline,
    pub clock: ManualClock,
    pub stats: Arc<StatsCounter>,
    pub breaker: Arc<CircuitBreaker>,
}

pub fn build_pipeline(source: Source, url: &str, config: GatewayConfig) -> TestPipeline {
    let clock = ManualClock::at(1_000_000);
    let stats = Arc::new(StatsCounter::new());
    let breaker = Arc::new(CircuitBreaker::new(
        config.breaker_threshold,
        config.breaker_timeout,
        Arc::new(clock.clone()),
    ));
    let fetcher = Arc::new(HttpFetcher::new(config.http_timeout).expect("client builds"));
    let adapter = Arc::new(StubAdapter::new(source, url));
    let pipeline = SourcePipeline::new(
        adapter,
        fetcher,
        &config,
        breaker.clone(),
        stats.clone(),
        Arc::new(clock.clone()),
    )
    .with_sleeper(Arc::new(InstantSleeper));
    TestPipeline { pipeline, clock, stats, breaker }
}

/// Paths the stub aggregator's five sources fetch from, in fan-out order.
pub const STUB_PATHS: [(&str, Source); 5] = [
    ("/usgs", Source::Usgs),
    ("/eonet", Source::NasaEonet),
    ("/gdacs", Source::Gdacs),
    ("/reliefweb", Source::ReliefWeb),
    ("/nws", Source::Nws),
];

/// Aggregator over five stub adapters pointed at `base_url` + the stub paths.
pub fn build_aggregator(
    base_url: &str,
    config: GatewayConfig,
    clock: &ManualClock,
) -> Arc<Aggregator> {
    let adapters = STUB_PATHS
        .iter()
        .map(|(path, source)| {
            Arc::new(StubAdapter::new(*source, format!("{base_url}{path}")))
                as Arc<dyn SourceAdapter>
        })
        .collect();
    Arc::new(
        Aggregator::with_adapters(config, Arc::new(clock.clone()), adapters)
            .expect("aggregator builds"),
    )
}
