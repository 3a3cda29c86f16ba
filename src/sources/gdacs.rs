//! GDACS RSS alert feed adapter.
//!
//! The feed is small and loosely structured, so items are pulled out with
//! plain regex extraction rather than an XML parser: namespaces drift between
//! GDACS releases and a strict parser breaks on them, while tag-by-tag capture
//! does not. Descriptions are HTML; tags and common entities are stripped and
//! the text is capped at 200 characters.
//!
//! The feed carries no stable item ids, so each decoded event gets a
//! synthesized `gdacs-<epoch ms>-<random>` id. These are deliberately not
//! stable across fetches.

use chrono::Utc;
use rand::distr::Alphanumeric;
use rand::Rng;
use regex::Regex;

use crate::error::FetchError;
use crate::event::{coords_in_range, EventType, NormalizedEvent, Source};

use super::{parse_instant, Endpoint, SourceAdapter};

const FEED_URL: &str = "https://www.gdacs.org/xml/rss.xml";

const DESCRIPTION_LIMIT: usize = 200;

#[derive(Debug, Clone)]
pub struct GdacsAdapter {
    url: String,
    item: Regex,
    html_tag: Regex,
    title: Regex,
    description: Regex,
    pub_date: Regex,
    link: Regex,
    geo_lat: Regex,
    gdacs_lat: Regex,
    geo_long: Regex,
    gdacs_long: Regex,
    alert_level: Regex,
    event_type: Regex,
}

impl GdacsAdapter {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_url(FEED_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Result<Self, FetchError> {
        let tag = |name: &str| {
            Regex::new(&format!(r"(?s)<{name}[^>]*>(.*?)</{name}>"))
                .map_err(|e| FetchError::Decode(e.to_string()))
        };
        Ok(Self {
            url: url.into(),
            item: tag("item")?,
            html_tag: Regex::new(r"<[^>]*>").map_err(|e| FetchError::Decode(e.to_string()))?,
            title: tag("title")?,
            description: tag("description")?,
            pub_date: tag("pubDate")?,
            link: tag("link")?,
            geo_lat: tag("geo:lat")?,
            gdacs_lat: tag("gdacs:lat")?,
            geo_long: tag("geo:long")?,
            gdacs_long: tag("gdacs:long")?,
            alert_level: tag("gdacs:alertlevel")?,
            event_type: tag("gdacs:eventtype")?,
        })
    }

    fn tag_text(&self, pattern: &Regex, block: &str) -> Option<String> {
        let captured = pattern.captures(block)?.get(1)?.as_str();
        let trimmed = strip_cdata(captured).trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    }

    fn coordinate(&self, primary: &Regex, fallback: &Regex, block: &str) -> Option<f64> {
        self.tag_text(primary, block)
            .or_else(|| self.tag_text(fallback, block))
            .and_then(|raw| raw.parse().ok())
    }

    fn clean_text(&self, raw: &str) -> String {
        // Decode first: GDACS descriptions arrive with entity-encoded markup,
        // which only becomes strippable tags after decoding.
        let decoded = decode_entities(raw);
        let without_tags = self.html_tag.replace_all(&decoded, " ");
        let collapsed = without_tags.split_whitespace().collect::<Vec<_>>().join(" ");
        collapsed.chars().take(DESCRIPTION_LIMIT).collect()
    }
}

impl SourceAdapter for GdacsAdapter {
    fn source(&self) -> Source {
        Source::Gdacs
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        vec![Endpoint::bare(&self.url)]
    }

    fn decode(&self, bodies: &[Vec<u8>]) -> Result<Vec<NormalizedEvent>, FetchError> {
        let body = bodies.first().map(Vec::as_slice).unwrap_or_default();
        let text = String::from_utf8_lossy(body);
        let fetch_time = Utc::now();
        let mut events = Vec::new();

        for captures in self.item.captures_iter(&text) {
            let Some(block) = captures.get(1).map(|m| m.as_str()) else { continue };

            let Some(lat) = self.coordinate(&self.geo_lat, &self.gdacs_lat, block) else {
                continue;
            };
            let Some(lng) = self.coordinate(&self.geo_long, &self.gdacs_long, block) else {
                continue;
            };
            if lat == 0.0 && lng == 0.0 {
                continue;
            }
            if !coords_in_range(lat, lng) {
                continue;
            }

            let event_type = self
                .tag_text(&self.event_type, block)
                .map(|code| type_code(&code))
                .unwrap_or(EventType::Other);
            let alert = self
                .tag_text(&self.alert_level, block)
                .unwrap_or_else(|| "Green".to_string());

            let location = self
                .tag_text(&self.title, block)
                .map(|title| self.clean_text(&title))
                .unwrap_or_else(|| "Unknown Location".to_string());
            let description = self
                .tag_text(&self.description, block)
                .map(|raw| self.clean_text(&raw))
                .unwrap_or_default();
            let timestamp = self
                .tag_text(&self.pub_date, block)
                .map(|raw| parse_instant(&raw, fetch_time))
                .unwrap_or(fetch_time);

            events.push(NormalizedEvent {
                sequence_id: 0,
                source_id: synthesize_id(),
                source: Source::Gdacs,
                event_type,
                severity: alert_severity(&alert),
                lat,
                lng,
                radius: event_type.default_radius(),
                location,
                description,
                timestamp,
                url: self.tag_text(&self.link, block),
                magnitude: None,
                alert_level: Some(alert),
                expires: None,
                status: None,
            });
        }
        Ok(events)
    }
}

fn type_code(code: &str) -> EventType {
    match code.trim().to_ascii_uppercase().as_str() {
        "EQ" => EventType::Earthquake,
        "TC" => EventType::Hurricane,
        "FL" => EventType::Flood,
        "VO" => EventType::Volcano,
        "DR" => EventType::Drought,
        "WF" => EventType::Wildfire,
        _ => EventType::Other,
    }
}

fn alert_severity(level: &str) -> u8 {
    match level.trim().to_ascii_lowercase().as_str() {
        "red" => 9,
        "orange" => 7,
        "green" => 4,
        _ => 5,
    }
}

fn strip_cdata(raw: &str) -> &str {
    raw.trim()
        .strip_prefix("<![CDATA[")
        .and_then(|rest| rest.strip_suffix("]]>"))
        .unwrap_or(raw)
}

fn decode_entities(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

fn synthesize_id() -> String {
    let suffix: String =
        rand::rng().sample_iter(Alphanumeric).take(6).map(char::from).collect();
    format!("gdacs-{}-{}", Utc::now().timestamp_millis(), suffix.to_lowercase())
}
