//! NASA EONET open-event feed adapter.
//!
//! Events carry a geometry history; only the latest entry is used. Coordinates
//! are either a point pair or a track (list of pairs), in which case the first
//! pair of the latest entry is taken. Category ids map to type and severity
//! through fixed tables.

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use crate::error::FetchError;
use crate::event::{clamp_severity, coords_in_range, EventType, NormalizedEvent, Source};

use super::{body_json, parse_instant, Endpoint, SourceAdapter};

const EVENTS_URL: &str = "https://eonet.gsfc.nasa.gov/api/v2.1/events?status=open";

#[derive(Debug, Clone)]
pub struct EonetAdapter {
    url: String,
}

impl Default for EonetAdapter {
    fn default() -> Self {
        Self { url: EVENTS_URL.to_string() }
    }
}

impl EonetAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[derive(Debug, Deserialize)]
struct EventsDoc {
    #[serde(default)]
    events: Vec<Event>,
}

#[derive(Debug, Deserialize)]
struct Event {
    id: Option<String>,
    title: Option<String>,
    link: Option<String>,
    #[serde(default)]
    categories: Vec<Category>,
    #[serde(default)]
    geometry: Vec<GeometryEntry>,
}

#[derive(Debug, Deserialize)]
struct Category {
    id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct GeometryEntry {
    date: Option<String>,
    #[serde(default)]
    coordinates: Value,
}

impl SourceAdapter for EonetAdapter {
    fn source(&self) -> Source {
        Source::NasaEonet
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        vec![Endpoint::bare(&self.url)]
    }

    fn decode(&self, bodies: &[Vec<u8>]) -> Result<Vec<NormalizedEvent>, FetchError> {
        let body = bodies.first().map(Vec::as_slice).unwrap_or_default();
        let doc: EventsDoc = body_json(body)?;
        let fetch_time = Utc::now();
        let mut events = Vec::new();

        for event in doc.events {
            let Some(id) = event.id.filter(|id| !id.is_empty()) else { continue };
            let Some(latest) = event.geometry.last() else { continue };
            let Some((lng, lat)) = coordinate_pair(&latest.coordinates) else { continue };
            if !coords_in_range(lat, lng) {
                continue;
            }

            let category = event.categories.first().and_then(|c| c.id);
            let event_type = category.map(category_type).unwrap_or(EventType::Other);
            let severity = clamp_severity(category.map(category_severity).unwrap_or(5));
            let title = event.title.unwrap_or_else(|| "Unknown Event".to_string());
            let timestamp = latest
                .date
                .as_deref()
                .map(|raw| parse_instant(raw, fetch_time))
                .unwrap_or(fetch_time);

            events.push(NormalizedEvent {
                sequence_id: 0,
                source_id: id,
                source: Source::NasaEonet,
                event_type,
                severity,
                lat,
                lng,
                radius: event_type.default_radius(),
                location: title.clone(),
                description: title,
                timestamp,
                url: event.link,
                magnitude: None,
                alert_level: None,
                expires: None,
                status: None,
            });
        }
        Ok(events)
    }
}

/// `[lng, lat]` for a point geometry, or the first pair of a track.
fn coordinate_pair(coordinates: &Value) -> Option<(f64, f64)> {
    let array = coordinates.as_array()?;
    match array.first()? {
        Value::Number(_) => Some((array.first()?.as_f64()?, array.get(1)?.as_f64()?)),
        Value::Array(inner) => Some((inner.first()?.as_f64()?, inner.get(1)?.as_f64()?)),
        _ => None,
    }
}

fn category_type(id: i64) -> EventType {
    match id {
        6 => EventType::Drought,
        7 => EventType::DustHaze,
        8 => EventType::Wildfire,
        9 | 13 => EventType::Flood,
        10 => EventType::Hurricane,
        12 => EventType::Volcano,
        14 => EventType::Landslide,
        15 => EventType::SeaLakeIce,
        16 => EventType::Earthquake,
        17 => EventType::Snow,
        18 => EventType::Temperature,
        _ => EventType::Other,
    }
}

fn category_severity(id: i64) -> u8 {
    match id {
        8 | 12 => 8,
        10 => 9,
        9 => 6,
        16 => 7,
        _ => 5,
    }
}
