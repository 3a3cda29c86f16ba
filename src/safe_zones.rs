//! Bundled static safe-zone list.
//!
//! Loaded once at startup. A missing or unreadable file is not an error; the
//! gateway runs with an empty list and logs a warning.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Default location of the bundled data file, relative to the working dir.
pub const DEFAULT_PATH: &str = "data/safe_zones.json";

/// One designated shelter or assembly point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeZone {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub lat: f64,
    pub lng: f64,
    pub address: String,
    pub capacity: u32,
    pub available: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SafeZoneFile {
    #[serde(default)]
    safe_zones: Vec<SafeZone>,
}

/// Load the bundled list; absent or malformed files yield an empty list.
pub fn load(path: &Path) -> Vec<SafeZone> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "safe zones file unavailable");
            return Vec::new();
        }
    };
    match serde_json::from_slice::<SafeZoneFile>(&raw) {
        Ok(file) => {
            tracing::info!(count = file.safe_zones.len(), "safe zones loaded");
            file.safe_zones
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "safe zones file unreadable");
            Vec::new()
        }
    }
}
