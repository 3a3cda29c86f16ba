//! The normalized event model every source adapter decodes into.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Upstream provider identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Source {
    #[serde(rename = "USGS")]
    Usgs,
    #[serde(rename = "NASA EONET")]
    NasaEonet,
    #[serde(rename = "GDACS")]
    Gdacs,
    #[serde(rename = "ReliefWeb")]
    ReliefWeb,
    #[serde(rename = "NWS")]
    Nws,
}

impl Source {
    /// All upstreams, in fan-out (and therefore dedup arrival) order.
    pub const ALL: [Source; 5] =
        [Source::Usgs, Source::NasaEonet, Source::Gdacs, Source::ReliefWeb, Source::Nws];

    /// Display name used on the wire.
    pub fn name(self) -> &'static str {
        match self {
            Source::Usgs => "USGS",
            Source::NasaEonet => "NASA EONET",
            Source::Gdacs => "GDACS",
            Source::ReliefWeb => "ReliefWeb",
            Source::Nws => "NWS",
        }
    }

    /// Short key used in operator routes (`/api/cache/clear/{api}`).
    pub fn api_key(self) -> &'static str {
        match self {
            Source::Usgs => "usgs",
            Source::NasaEonet => "nasa",
            Source::Gdacs => "gdacs",
            Source::ReliefWeb => "reliefweb",
            Source::Nws => "nws",
        }
    }

    /// Inverse of [`Source::api_key`].
    pub fn from_api_key(key: &str) -> Option<Source> {
        Source::ALL.into_iter().find(|s| s.api_key() == key)
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::error::Error for Source {}

/// Normalized disaster category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EventType {
    Earthquake,
    Wildfire,
    Fire,
    Flood,
    Hurricane,
    Tornado,
    Volcano,
    Epidemic,
    War,
    Thunderstorm,
    Tsunami,
    Drought,
    Snow,
    Heat,
    Wind,
    Landslide,
    DustHaze,
    SeaLakeIce,
    Temperature,
    Other,
}

impl EventType {
    /// Default estimated impact radius in meters, used by every adapter except
    /// USGS (which derives radius from magnitude).
    pub fn default_radius(self) -> u32 {
        match self {
            EventType::Earthquake => 50_000,
            EventType::Hurricane => 200_000,
            EventType::Tornado => 15_000,
            EventType::Flood => 30_000,
            EventType::Wildfire => 25_000,
            EventType::Volcano => 40_000,
            EventType::Epidemic => 100_000,
            EventType::War => 150_000,
            EventType::Tsunami => 100_000,
            EventType::Thunderstorm => 20_000,
            EventType::Drought => 200_000,
            _ => 20_000,
        }
    }

    /// Categories the `/api/disasters/weather` filter keeps.
    pub fn is_weather(self) -> bool {
        matches!(
            self,
            EventType::Hurricane
                | EventType::Tornado
                | EventType::Thunderstorm
                | EventType::Flood
                | EventType::Snow
                | EventType::Heat
        )
    }

    /// Wire string, matching the serde rename.
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Earthquake => "earthquake",
            EventType::Wildfire => "wildfire",
            EventType::Fire => "fire",
            EventType::Flood => "flood",
            EventType::Hurricane => "hurricane",
            EventType::Tornado => "tornado",
            EventType::Volcano => "volcano",
            EventType::Epidemic => "epidemic",
            EventType::War => "war",
            EventType::Thunderstorm => "thunderstorm",
            EventType::Tsunami => "tsunami",
            EventType::Drought => "drought",
            EventType::Snow => "snow",
            EventType::Heat => "heat",
            EventType::Wind => "wind",
            EventType::Landslide => "landslide",
            EventType::DustHaze => "dustHaze",
            EventType::SeaLakeIce => "seaLakeIce",
            EventType::Temperature => "temperature",
            EventType::Other => "other",
        }
    }
}

/// One normalized disaster event, the unit the whole system traffics in.
///
/// Invariants enforced at decode time: `severity` is within 1..=10, `lat`/`lng`
/// are finite and in range (events failing this are dropped, never clamped),
/// `radius` is positive, `source_id` is non-empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedEvent {
    /// Position in the ranked merged batch; assigned by the aggregator,
    /// not stable across fetches.
    pub sequence_id: u64,
    /// Upstream-unique id, used for within-source dedup.
    pub source_id: String,
    pub source: Source,
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// 1..=10, higher is worse.
    pub severity: u8,
    pub lat: f64,
    pub lng: f64,
    /// Estimated impact radius in meters.
    pub radius: u32,
    pub location: String,
    pub description: String,
    /// Event effective time, not fetch time.
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub magnitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// True when both coordinates are finite and inside WGS84 bounds.
pub fn coords_in_range(lat: f64, lng: f64) -> bool {
    lat.is_finite()
        && lng.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lng)
}

/// Force a raw severity estimate into the 1..=10 band.
pub fn clamp_severity(raw: u8) -> u8 {
    raw.clamp(1, 10)
}
