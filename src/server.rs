//! HTTP surface: a thin axum layer over the aggregator.
//!
//! Route handlers only translate between HTTP and the aggregator; all caching,
//! resilience, and merge logic lives below.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;

use crate::aggregator::Aggregator;
use crate::error::FetchError;
use crate::event::{EventType, NormalizedEvent, Source};
use crate::safe_zones::SafeZone;

/// Shared state handed to every handler.
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    pub safe_zones: Arc<Vec<SafeZone>>,
}

/// The full route surface.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/disasters", get(all_disasters))
        .route("/api/disasters/earthquakes", get(earthquakes))
        .route("/api/disasters/weather", get(weather))
        .route("/api/disasters/stats", get(disaster_stats))
        .route("/api/disasters/refresh", post(refresh))
        .route("/api/safe-zones", get(safe_zones))
        .route("/api/sources", get(sources))
        .route("/api/cache/status", get(cache_status))
        .route("/api/cache/stats", get(cache_stats))
        .route("/api/cache/clear", post(cache_clear_all))
        .route("/api/cache/clear/{api}", post(cache_clear_one))
        .route("/api/cache/stats/reset", post(stats_reset))
        .route("/api/circuit-breaker/reset", post(breaker_reset_all))
        .route("/api/circuit-breaker/reset/{api}", post(breaker_reset_one))
        .route("/health", get(health))
        .fallback(not_found)
        .with_state(state)
}

async fn all_disasters(State(state): State<Arc<AppState>>) -> Response {
    match state.aggregator.disasters(false, None).await {
        Ok(view) => {
            let body = json!({
                "disasters": view.snapshot.events,
                "safeZones": &*state.safe_zones,
                "meta": {
                    "timestamp": Utc::now().to_rfc3339(),
                    "totalDisasters": view.snapshot.events.len(),
                    "totalSafeZones": state.safe_zones.len(),
                    "sources": view.snapshot.sources,
                },
            });
            ([(header::CACHE_CONTROL, "public, max-age=60")], Json(body)).into_response()
        }
        Err(err) => core_failure(err),
    }
}

async fn earthquakes(State(state): State<Arc<AppState>>) -> Response {
    filtered(&state, |event| event.event_type == EventType::Earthquake).await
}

async fn weather(State(state): State<Arc<AppState>>) -> Response {
    filtered(&state, |event| event.event_type.is_weather()).await
}

async fn filtered(state: &AppState, keep: impl Fn(&NormalizedEvent) -> bool) -> Response {
    match state.aggregator.disasters(false, None).await {
        Ok(view) => {
            let matching: Vec<&NormalizedEvent> =
                view.snapshot.events.iter().filter(|event| keep(event)).collect();
            Json(json!({
                "disasters": matching,
                "meta": {
                    "timestamp": Utc::now().to_rfc3339(),
                    "totalDisasters": matching.len(),
                },
            }))
            .into_response()
        }
        Err(err) => core_failure(err),
    }
}

async fn disaster_stats(State(state): State<Arc<AppState>>) -> Response {
    match state.aggregator.disasters(false, None).await {
        Ok(view) => {
            let mut by_type: BTreeMap<&'static str, usize> = BTreeMap::new();
            let mut by_source: BTreeMap<&'static str, usize> = BTreeMap::new();
            let mut critical = 0usize;
            let mut warning = 0usize;
            let mut minor = 0usize;
            for event in &view.snapshot.events {
                *by_type.entry(event.event_type.as_str()).or_default() += 1;
                *by_source.entry(event.source.name()).or_default() += 1;
                match event.severity {
                    8..=10 => critical += 1,
                    5..=7 => warning += 1,
                    _ => minor += 1,
                }
            }
            Json(json!({
                "total": view.snapshot.events.len(),
                "byType": by_type,
                "bySeverity": {"critical": critical, "warning": warning, "minor": minor},
                "bySource": by_source,
                "timestamp": Utc::now().to_rfc3339(),
            }))
            .into_response()
        }
        Err(err) => core_failure(err),
    }
}

async fn refresh(State(state): State<Arc<AppState>>) -> Response {
    match state.aggregator.disasters(true, None).await {
        Ok(view) => Json(json!({
            "message": "refresh completed",
            "totalDisasters": view.snapshot.events.len(),
            "sources": view.snapshot.sources,
            "timestamp": Utc::now().to_rfc3339(),
        }))
        .into_response(),
        Err(err) => core_failure(err),
    }
}

async fn safe_zones(State(state): State<Arc<AppState>>) -> Response {
    Json(json!({
        "safeZones": &*state.safe_zones,
        "total": state.safe_zones.len(),
    }))
    .into_response()
}

async fn sources() -> Response {
    Json(json!({
        "sources": [
            {
                "id": "usgs",
                "name": "USGS",
                "description": "Earthquake feeds (daily all + significant month)",
                "url": "https://earthquake.usgs.gov",
            },
            {
                "id": "nasa",
                "name": "NASA EONET",
                "description": "Open natural-event tracker",
                "url": "https://eonet.gsfc.nasa.gov",
            },
            {
                "id": "gdacs",
                "name": "GDACS",
                "description": "Global disaster alert RSS feed",
                "url": "https://www.gdacs.org",
            },
            {
                "id": "reliefweb",
                "name": "ReliefWeb",
                "description": "Humanitarian crisis reports",
                "url": "https://reliefweb.int",
            },
            {
                "id": "nws",
                "name": "NWS",
                "description": "US active weather alerts",
                "url": "https://api.weather.gov",
            },
        ],
    }))
    .into_response()
}

async fn cache_status(State(state): State<Arc<AppState>>) -> Response {
    Json(state.aggregator.cache_status()).into_response()
}

async fn cache_stats(State(state): State<Arc<AppState>>) -> Response {
    Json(json!({
        "stats": state.aggregator.stats_snapshot(),
        "config": state.aggregator.config().summary(),
    }))
    .into_response()
}

async fn cache_clear_all(State(state): State<Arc<AppState>>) -> Response {
    state.aggregator.clear_cache(None);
    Json(json!({"message": "all caches cleared"})).into_response()
}

async fn cache_clear_one(
    State(state): State<Arc<AppState>>,
    Path(api): Path<String>,
) -> Response {
    match Source::from_api_key(&api) {
        Some(source) => {
            state.aggregator.clear_cache(Some(source));
            Json(json!({"message": format!("{} cache cleared", source.name())}))
                .into_response()
        }
        None => unknown_api(&api),
    }
}

async fn stats_reset(State(state): State<Arc<AppState>>) -> Response {
    state.aggregator.reset_stats();
    Json(json!({"message": "stats reset"})).into_response()
}

async fn breaker_reset_all(State(state): State<Arc<AppState>>) -> Response {
    state.aggregator.reset_breakers(None);
    Json(json!({"message": "all circuit breakers reset"})).into_response()
}

async fn breaker_reset_one(
    State(state): State<Arc<AppState>>,
    Path(api): Path<String>,
) -> Response {
    match Source::from_api_key(&api) {
        Some(source) => {
            state.aggregator.reset_breakers(Some(source));
            Json(json!({"message": format!("{} circuit breaker reset", source.name())}))
                .into_response()
        }
        None => unknown_api(&api),
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Response {
    Json(state.aggregator.health()).into_response()
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"error": "Not found"}))).into_response()
}

fn core_failure(err: FetchError) -> Response {
    tracing::error!(error = %err, "aggregate request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "aggregation failed", "message": err.to_string()})),
    )
        .into_response()
}

fn unknown_api(api: &str) -> Response {
    let valid: Vec<&str> = Source::ALL.iter().map(|s| s.api_key()).collect();
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": format!("unknown api '{api}'"), "validApis": valid})),
    )
        .into_response()
}
