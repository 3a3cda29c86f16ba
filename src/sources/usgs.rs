//! USGS earthquake feed adapter.
//!
//! Unions two GeoJSON feeds (the rolling daily feed and the significant-month
//! feed), de-duplicates by feature id, and drops minor quakes below magnitude
//! 2.5. Radius scales exponentially with magnitude rather than using the
//! per-type default table.

use std::collections::HashSet;

use chrono::{TimeZone, Utc};
use serde::Deserialize;

use crate::error::FetchError;
use crate::event::{coords_in_range, EventType, NormalizedEvent, Source};

use super::{body_json, Endpoint, SourceAdapter};

const ALL_DAY_URL: &str =
    "https://earthquake.usgs.gov/earthquakes/feed/v1.0/summary/all_day.geojson";
const SIGNIFICANT_MONTH_URL: &str =
    "https://earthquake.usgs.gov/earthquakes/feed/v1.0/summary/significant_month.geojson";

const MIN_MAGNITUDE: f64 = 2.5;

#[derive(Debug, Clone)]
pub struct UsgsAdapter {
    all_day_url: String,
    significant_url: String,
}

impl Default for UsgsAdapter {
    fn default() -> Self {
        Self {
            all_day_url: ALL_DAY_URL.to_string(),
            significant_url: SIGNIFICANT_MONTH_URL.to_string(),
        }
    }
}

impl UsgsAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point both feeds at alternate URLs (used by tests against a mock server).
    pub fn with_urls(all_day_url: impl Into<String>, significant_url: impl Into<String>) -> Self {
        Self { all_day_url: all_day_url.into(), significant_url: significant_url.into() }
    }
}

#[derive(Debug, Deserialize)]
struct FeedDoc {
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
    mag: Option<f64>,
    place: Option<String>,
    time: Option<i64>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(default)]
    coordinates: Vec<f64>,
}

impl SourceAdapter for UsgsAdapter {
    fn source(&self) -> Source {
        Source::Usgs
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        vec![Endpoint::bare(&self.all_day_url), Endpoint::bare(&self.significant_url)]
    }

    fn decode(&self, bodies: &[Vec<u8>]) -> Result<Vec<NormalizedEvent>, FetchError> {
        let mut seen = HashSet::new();
        let mut events = Vec::new();
        let fetch_time = Utc::now();

        for body in bodies {
            let doc: FeedDoc = body_json(body)?;
            for feature in doc.features {
                let Some(id) = feature.id.filter(|id| !id.is_empty()) else { continue };
                if !seen.insert(id.clone()) {
                    continue;
                }
                let Some(mag) = feature.properties.mag else { continue };
                if mag < MIN_MAGNITUDE {
                    continue;
                }
                let Some(geometry) = feature.geometry else { continue };
                let [lng, lat] = match geometry.coordinates[..] {
                    [lng, lat, ..] => [lng, lat],
                    _ => continue,
                };
                if !coords_in_range(lat, lng) {
                    continue;
                }
                let depth_km = geometry.coordinates.get(2).copied();

                let timestamp = feature
                    .properties
                    .time
                    .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
                    .unwrap_or(fetch_time);

                let description = match depth_km {
                    Some(depth) => {
                        format!("Magnitude {mag:.1} earthquake at {depth:.0} km depth")
                    }
                    None => format!("Magnitude {mag:.1} earthquake"),
                };

                events.push(NormalizedEvent {
                    sequence_id: 0,
                    source_id: id,
                    source: Source::Usgs,
                    event_type: EventType::Earthquake,
                    severity: magnitude_severity(mag),
                    lat,
                    lng,
                    radius: magnitude_radius(mag),
                    location: feature
                        .properties
                        .place
                        .unwrap_or_else(|| "Unknown Location".to_string()),
                    description,
                    timestamp,
                    url: feature.properties.url,
                    magnitude: Some(mag),
                    alert_level: None,
                    expires: None,
                    status: None,
                });
            }
        }
        Ok(events)
    }
}

fn magnitude_severity(mag: f64) -> u8 {
    if mag >= 8.0 {
        10
    } else if mag >= 7.0 {
        9
    } else if mag >= 6.0 {
        8
    } else if mag >= 5.0 {
        7
    } else if mag >= 4.0 {
        5
    } else if mag >= 3.0 {
        3
    } else {
        2
    }
}

/// Impact radius in meters: 10 km at magnitude 3, doubling per whole magnitude.
fn magnitude_radius(mag: f64) -> u32 {
    (10_000.0 * 2f64.powf(mag - 3.0)).round() as u32
}
