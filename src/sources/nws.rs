//! NWS active weather-alert feed adapter.
//!
//! Only features with a usable geometry are kept: points directly, polygons
//! through the arithmetic mean of the outer ring's vertices. That mean is not
//! a true polygon centroid and is not meant to be; alert polygons are small
//! enough that the vertex mean lands inside them. The batch is capped at 30
//! alerts. NWS rejects anonymous clients, so the adapter always sends a
//! descriptive User-Agent.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::FetchError;
use crate::event::{coords_in_range, EventType, NormalizedEvent, Source};

use super::{body_json, parse_instant, Endpoint, SourceAdapter};

const ALERTS_URL: &str = "https://api.weather.gov/alerts/active";
const USER_AGENT: &str = "hazardgate/0.1 (https://github.com/hazardgate/hazardgate; ops@hazardgate.dev)";

const MAX_ALERTS: usize = 30;

#[derive(Debug, Clone)]
pub struct NwsAdapter {
    url: String,
}

impl Default for NwsAdapter {
    fn default() -> Self {
        Self { url: ALERTS_URL.to_string() }
    }
}

impl NwsAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[derive(Debug, Deserialize)]
struct Doc {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    id: Option<String>,
    #[serde(default)]
    properties: Properties,
    geometry: Option<Geometry>,
}

#[derive(Debug, Default, Deserialize)]
struct Properties {
    event: Option<String>,
    severity: Option<String>,
    headline: Option<String>,
    #[serde(rename = "areaDesc")]
    area_desc: Option<String>,
    description: Option<String>,
    sent: Option<String>,
    effective: Option<String>,
    onset: Option<String>,
    expires: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Value,
}

impl SourceAdapter for NwsAdapter {
    fn source(&self) -> Source {
        Source::Nws
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        vec![Endpoint::bare(&self.url)
            .with_header("User-Agent", USER_AGENT)
            .with_header("Accept", "application/geo+json")]
    }

    fn decode(&self, bodies: &[Vec<u8>]) -> Result<Vec<NormalizedEvent>, FetchError> {
        let body = bodies.first().map(Vec::as_slice).unwrap_or_default();
        let doc: Doc = body_json(body)?;
        let fetch_time = Utc::now();
        let mut events = Vec::new();

        for feature in doc.features {
            if events.len() >= MAX_ALERTS {
                break;
            }
            let Some(id) = feature.id.filter(|id| !id.is_empty()) else { continue };
            let Some(geometry) = feature.geometry else { continue };
            let Some((lat, lng)) = resolve_coordinates(&geometry) else { continue };
            if !coords_in_range(lat, lng) {
                continue;
            }

            let properties = feature.properties;
            let event_name = properties.event.unwrap_or_default();
            let event_type = infer_type(&event_name);
            let timestamp = properties
                .onset
                .or(properties.effective)
                .or(properties.sent)
                .map(|raw| parse_instant(&raw, fetch_time))
                .unwrap_or(fetch_time);
            let expires: Option<DateTime<Utc>> =
                properties.expires.map(|raw| parse_instant(&raw, fetch_time));

            let location = properties
                .area_desc
                .or_else(|| properties.headline.clone())
                .unwrap_or_else(|| "Unknown Location".to_string());
            let description = properties
                .headline
                .or(properties.description)
                .unwrap_or_else(|| event_name.clone());

            events.push(NormalizedEvent {
                sequence_id: 0,
                source_id: id.clone(),
                source: Source::Nws,
                event_type,
                severity: nws_severity(properties.severity.as_deref()),
                lat,
                lng,
                radius: event_type.default_radius(),
                location,
                description,
                timestamp,
                url: Some(id),
                magnitude: None,
                alert_level: properties.severity,
                expires,
                status: None,
            });
        }
        Ok(events)
    }
}

/// `(lat, lng)` from a Point, or the vertex mean of a Polygon's outer ring.
fn resolve_coordinates(geometry: &Geometry) -> Option<(f64, f64)> {
    match geometry.kind.as_str() {
        "Point" => {
            let pair = geometry.coordinates.as_array()?;
            Some((pair.get(1)?.as_f64()?, pair.first()?.as_f64()?))
        }
        "Polygon" => {
            let outer = geometry.coordinates.as_array()?.first()?.as_array()?;
            let mut lat_sum = 0.0;
            let mut lng_sum = 0.0;
            let mut count = 0usize;
            for vertex in outer {
                let vertex = vertex.as_array()?;
                lng_sum += vertex.first()?.as_f64()?;
                lat_sum += vertex.get(1)?.as_f64()?;
                count += 1;
            }
            if count == 0 {
                return None;
            }
            Some((lat_sum / count as f64, lng_sum / count as f64))
        }
        _ => None,
    }
}

fn infer_type(event: &str) -> EventType {
    let lower = event.to_lowercase();
    if lower.contains("tornado") {
        EventType::Tornado
    } else if lower.contains("hurricane") || lower.contains("tropical") {
        EventType::Hurricane
    } else if lower.contains("flood") {
        EventType::Flood
    } else if lower.contains("fire") {
        EventType::Fire
    } else if lower.contains("earthquake") {
        EventType::Earthquake
    } else if lower.contains("tsunami") {
        EventType::Tsunami
    } else if lower.contains("winter") || lower.contains("blizzard") || lower.contains("snow") {
        EventType::Snow
    } else if lower.contains("thunder") || lower.contains("storm") {
        EventType::Thunderstorm
    } else if lower.contains("wind") {
        EventType::Wind
    } else if lower.contains("heat") {
        EventType::Heat
    } else {
        EventType::Thunderstorm
    }
}

fn nws_severity(severity: Option<&str>) -> u8 {
    match severity.unwrap_or("").to_lowercase().as_str() {
        "extreme" => 10,
        "severe" => 8,
        "moderate" => 6,
        "minor" => 4,
        _ => 5,
    }
}
