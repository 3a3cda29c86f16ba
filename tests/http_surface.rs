//! End-to-end checks of the HTTP surface against a live listener, with the
//! five upstreams simulated by wiremock.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{build_aggregator, test_config, STUB_PATHS};
use hazardgate::safe_zones::SafeZone;
use hazardgate::server::{self, AppState};
use hazardgate::ManualClock;

async fn start_gateway(upstreams: &MockServer) -> SocketAddr {
    for (route, _) in STUB_PATHS {
        let events = match route {
            "/usgs" => json!([
                {"id": "eq1", "type": "earthquake", "severity": 9,
                 "lat": 41.0, "lng": 142.1, "ts": "2025-01-03T00:00:00Z"},
            ]),
            "/nws" => json!([
                {"id": "to1", "type": "tornado", "severity": 10,
                 "lat": 35.2, "lng": -97.4, "ts": "2025-01-03T06:00:00Z"},
                {"id": "sn1", "type": "snow", "severity": 4,
                 "lat": 44.9, "lng": -93.2, "ts": "2025-01-03T05:00:00Z"},
            ]),
            _ => json!([]),
        };
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(events.to_string()))
            .mount(upstreams)
            .await;
    }

    let clock = ManualClock::at(1_000_000);
    let aggregator = build_aggregator(&upstreams.uri(), test_config(), &clock);
    let zones = vec![SafeZone {
        name: "Central Community Center".into(),
        kind: "shelter".into(),
        lat: 35.68,
        lng: 139.69,
        address: "2-8-1 Nishi-Shinjuku, Tokyo".into(),
        capacity: 800,
        available: true,
    }];
    let state = Arc::new(AppState { aggregator, safe_zones: Arc::new(zones) });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, server::router(state)).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn disasters_endpoint_returns_catalog_zones_and_meta() {
    let upstreams = MockServer::start().await;
    let addr = start_gateway(&upstreams).await;

    let response = reqwest::get(format!("http://{addr}/api/disasters")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers().get("cache-control").and_then(|v| v.to_str().ok()),
        Some("public, max-age=60")
    );

    let body: Value = response.json().await.unwrap();
    let disasters = body["disasters"].as_array().unwrap();
    assert_eq!(disasters.len(), 3);
    // Ranked: the severity-10 tornado leads, and sequence ids are contiguous.
    assert_eq!(disasters[0]["type"], "tornado");
    assert_eq!(disasters[0]["sequenceId"], 1);
    assert_eq!(disasters[2]["sequenceId"], 3);
    assert_eq!(body["meta"]["totalDisasters"], 3);
    assert_eq!(body["meta"]["totalSafeZones"], 1);
    assert_eq!(body["safeZones"][0]["type"], "shelter");
    assert_eq!(body["meta"]["sources"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn filtered_endpoints_select_by_type() {
    let upstreams = MockServer::start().await;
    let addr = start_gateway(&upstreams).await;

    let quakes: Value = reqwest::get(format!("http://{addr}/api/disasters/earthquakes"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let quake_list = quakes["disasters"].as_array().unwrap();
    assert_eq!(quake_list.len(), 1);
    assert_eq!(quake_list[0]["type"], "earthquake");

    let weather: Value = reqwest::get(format!("http://{addr}/api/disasters/weather"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let weather_list = weather["disasters"].as_array().unwrap();
    assert_eq!(weather_list.len(), 2, "tornado and snow");
}

#[tokio::test]
async fn stats_endpoint_buckets_by_severity() {
    let upstreams = MockServer::start().await;
    let addr = start_gateway(&upstreams).await;

    let stats: Value = reqwest::get(format!("http://{addr}/api/disasters/stats"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["total"], 3);
    assert_eq!(stats["bySeverity"]["critical"], 2);
    assert_eq!(stats["bySeverity"]["minor"], 1);
    assert_eq!(stats["byType"]["earthquake"], 1);
    assert_eq!(stats["bySource"]["NWS"], 2);
}

#[tokio::test]
async fn operator_routes_validate_the_api_segment() {
    let upstreams = MockServer::start().await;
    let addr = start_gateway(&upstreams).await;
    let client = reqwest::Client::new();

    let bad = client
        .post(format!("http://{addr}/api/cache/clear/espn"))
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status(), 400);
    let body: Value = bad.json().await.unwrap();
    assert!(body["validApis"].as_array().unwrap().contains(&json!("usgs")));

    let good = client
        .post(format!("http://{addr}/api/cache/clear/gdacs"))
        .send()
        .await
        .unwrap();
    assert_eq!(good.status(), 200);

    let reset = client
        .post(format!("http://{addr}/api/circuit-breaker/reset"))
        .send()
        .await
        .unwrap();
    assert_eq!(reset.status(), 200);
}

#[tokio::test]
async fn introspection_routes_expose_cache_and_config() {
    let upstreams = MockServer::start().await;
    let addr = start_gateway(&upstreams).await;

    // Populate the caches first.
    reqwest::get(format!("http://{addr}/api/disasters")).await.unwrap();

    let status: Value = reqwest::get(format!("http://{addr}/api/cache/status"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["sources"]["USGS"]["breaker"]["state"], "CLOSED");
    assert_eq!(status["sources"]["USGS"]["hasData"], true);
    assert_eq!(status["combined"]["hasData"], true);

    let stats: Value = reqwest::get(format!("http://{addr}/api/cache/stats"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["config"]["retryAttempts"], 1);
    assert!(stats["stats"]["totalFetches"].as_u64().unwrap() >= 5);

    let health: Value =
        reqwest::get(format!("http://{addr}/health")).await.unwrap().json().await.unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["sources"]["GDACS"]["breaker"], "CLOSED");
}

#[tokio::test]
async fn unknown_routes_get_a_json_404() {
    let upstreams = MockServer::start().await;
    let addr = start_gateway(&upstreams).await;

    let response = reqwest::get(format!("http://{addr}/api/unknown")).await.unwrap();
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Not found");
}

#[tokio::test]
async fn refresh_route_forces_a_new_fan_out() {
    let upstreams = MockServer::start().await;
    let addr = start_gateway(&upstreams).await;
    let client = reqwest::Client::new();

    reqwest::get(format!("http://{addr}/api/disasters")).await.unwrap();
    let refreshed: Value = client
        .post(format!("http://{addr}/api/disasters/refresh"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(refreshed["totalDisasters"], 3);
    assert_eq!(refreshed["message"], "refresh completed");

    let stats: Value = reqwest::get(format!("http://{addr}/api/cache/stats"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    // Two full fan-outs: the initial one plus the forced refresh.
    assert_eq!(stats["stats"]["totalFetches"].as_u64().unwrap(), 10);
}

#[tokio::test]
async fn safe_zones_and_sources_are_static() {
    let upstreams = MockServer::start().await;
    let addr = start_gateway(&upstreams).await;

    let zones: Value = reqwest::get(format!("http://{addr}/api/safe-zones"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(zones["total"], 1);
    assert_eq!(zones["safeZones"][0]["name"], "Central Community Center");

    let sources: Value = reqwest::get(format!("http://{addr}/api/sources"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(sources["sources"].as_array().unwrap().len(), 5);
    assert_eq!(sources["sources"][0]["id"], "usgs");
}
