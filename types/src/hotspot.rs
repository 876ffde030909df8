//! Hotspot directory metadata.

use serde::{Deserialize, Serialize};

use crate::challenge::Geocode;

/// Metadata for one hotspot, keyed by its address.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    pub address: String,
    /// Human-readable three-word name, e.g. `angry-purple-tiger`.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    /// Height at which the hotspot joined the chain.
    #[serde(default)]
    pub block_added: u64,
    /// Height of the last metadata update.
    #[serde(default)]
    pub block: u64,
    #[serde(default)]
    pub reward_scale: Option<f64>,
    #[serde(default)]
    pub status: Option<HotspotStatus>,
    #[serde(default)]
    pub geocode: Option<Geocode>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub nonce: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HotspotStatus {
    #[serde(default)]
    pub height: Option<u64>,
    /// `"online"` or `"offline"`.
    #[serde(default)]
    pub online: String,
}

impl Hotspot {
    /// Asserted coordinates, if the hotspot has a location.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => None,
        }
    }

    /// Online status string, empty when unknown.
    pub fn online_status(&self) -> &str {
        self.status.as_ref().map(|s| s.online.as_str()).unwrap_or("")
    }
}

/// Normalise a human-entered hotspot name to the canonical lowercase
/// hyphenated form (`"Angry Purple Tiger"` → `"angry-purple-tiger"`).
pub fn normalize_name(name: &str) -> String {
    name.split(|c: char| c.is_whitespace() || c == '-')
        .filter(|part| !part.is_empty())
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}
