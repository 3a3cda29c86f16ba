//! ReliefWeb humanitarian-crisis API adapter.
//!
//! Items without a geocoded primary country are useless to the map and are
//! skipped. The disaster category is inferred from the primary type name by
//! substring match; severity follows the crisis status.

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use crate::error::FetchError;
use crate::event::{coords_in_range, EventType, NormalizedEvent, Source};

use super::{body_json, parse_instant, Endpoint, SourceAdapter};

const DISASTERS_URL: &str =
    "https://api.reliefweb.int/v1/disasters?appname=hazardgate&profile=full&preset=latest&limit=50";

#[derive(Debug, Clone)]
pub struct ReliefWebAdapter {
    url: String,
}

impl Default for ReliefWebAdapter {
    fn default() -> Self {
        Self { url: DISASTERS_URL.to_string() }
    }
}

impl ReliefWebAdapter {
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
    data: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    id: Option<Value>,
    #[serde(default)]
    fields: Fields,
}

#[derive(Debug, Default, Deserialize)]
struct Fields {
    name: Option<String>,
    status: Option<String>,
    url: Option<String>,
    date: Option<DateInfo>,
    primary_country: Option<Country>,
    primary_type: Option<Named>,
}

#[derive(Debug, Deserialize)]
struct DateInfo {
    created: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Country {
    name: Option<String>,
    location: Option<Location>,
}

#[derive(Debug, Deserialize)]
struct Location {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: Option<String>,
}

impl SourceAdapter for ReliefWebAdapter {
    fn source(&self) -> Source {
        Source::ReliefWeb
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        vec![Endpoint::bare(&self.url)]
    }

    fn decode(&self, bodies: &[Vec<u8>]) -> Result<Vec<NormalizedEvent>, FetchError> {
        let body = bodies.first().map(Vec::as_slice).unwrap_or_default();
        let doc: Doc = body_json(body)?;
        let fetch_time = Utc::now();
        let mut events = Vec::new();

        for item in doc.data {
            let Some(id) = id_string(item.id.as_ref()) else { continue };
            let fields = item.fields;
            let Some(country) = fields.primary_country else { continue };
            let Some(location) = country.location else { continue };
            let (lat, lng) = (location.lat, location.lon);
            if lat == 0.0 && lng == 0.0 {
                continue;
            }
            if !coords_in_range(lat, lng) {
                continue;
            }

            let type_name = fields
                .primary_type
                .and_then(|t| t.name)
                .unwrap_or_default();
            let status = fields.status.unwrap_or_default();
            let headline = fields.name.unwrap_or_else(|| "Humanitarian Crisis".to_string());
            let timestamp = fields
                .date
                .and_then(|d| d.created)
                .map(|raw| parse_instant(&raw, fetch_time))
                .unwrap_or(fetch_time);
            let event_type = infer_type(&type_name);

            events.push(NormalizedEvent {
                sequence_id: 0,
                source_id: id,
                source: Source::ReliefWeb,
                event_type,
                severity: status_severity(&status),
                lat,
                lng,
                radius: event_type.default_radius(),
                location: country.name.unwrap_or_else(|| headline.clone()),
                description: headline,
                timestamp,
                url: fields.url,
                magnitude: None,
                alert_level: None,
                expires: None,
                status: if status.is_empty() { None } else { Some(status) },
            });
        }
        Ok(events)
    }
}

fn id_string(id: Option<&Value>) -> Option<String> {
    match id? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn infer_type(name: &str) -> EventType {
    let lower = name.to_lowercase();
    if lower.contains("earthquake") {
        EventType::Earthquake
    } else if lower.contains("flood") {
        EventType::Flood
    } else if lower.contains("cyclone") || lower.contains("hurricane") || lower.contains("typhoon")
    {
        EventType::Hurricane
    } else if lower.contains("volcano") {
        EventType::Volcano
    } else if lower.contains("drought") {
        EventType::Drought
    } else if lower.contains("fire") || lower.contains("wildfire") {
        EventType::Wildfire
    } else if lower.contains("epidemic") || lower.contains("outbreak") {
        EventType::Epidemic
    } else if lower.contains("conflict") || lower.contains("war") {
        EventType::War
    } else if lower.contains("tornado") {
        EventType::Tornado
    } else {
        EventType::Other
    }
}

fn status_severity(status: &str) -> u8 {
    match status.to_lowercase().as_str() {
        "alert" => 8,
        "ongoing" => 6,
        "past" => 3,
        _ => 5,
    }
}
