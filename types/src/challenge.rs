//! Proof-of-coverage challenge records as served by the remote API.
//!
//! Field names follow the API's JSON payload so records can be decoded straight
//! from a page response and exported again without a translation layer. Nested
//! fields the API sometimes omits or sends as `null` are modelled as `Option`.

use serde::{Deserialize, Serialize};

use crate::{Timestamp, TypesError};

/// The only record kind the analytics understand.
pub const POC_RECEIPTS_V1: &str = "poc_receipts_v1";

/// One proof-of-coverage event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChallengeRecord {
    #[serde(rename = "type")]
    pub kind: String,
    /// Block time in seconds as reported at the top level. Not always present.
    #[serde(default)]
    pub time: u64,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub path: Option<Vec<PathSegment>>,
    #[serde(default)]
    pub onion_key_hash: Option<String>,
    #[serde(default)]
    pub height: u64,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub fee: u64,
    #[serde(default)]
    pub challenger: Option<String>,
    #[serde(default)]
    pub challenger_owner: Option<String>,
    #[serde(default)]
    pub challenger_lat: Option<f64>,
    #[serde(default)]
    pub challenger_lon: Option<f64>,
    #[serde(default)]
    pub challenger_location: Option<String>,
}

/// One hop of a challenge path.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PathSegment {
    /// Hotspot that transmitted the beacon for this segment.
    pub challengee: String,
    #[serde(default)]
    pub witnesses: Option<Vec<WitnessObservation>>,
    #[serde(default)]
    pub receipt: Option<Receipt>,
    #[serde(default)]
    pub geocode: Option<Geocode>,
    #[serde(default)]
    pub challengee_owner: Option<String>,
    #[serde(default)]
    pub challengee_lat: Option<f64>,
    #[serde(default)]
    pub challengee_lon: Option<f64>,
    #[serde(default)]
    pub challengee_location: Option<String>,
}

/// A peer's report of having heard a beacon.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WitnessObservation {
    /// Address of the observing hotspot.
    pub gateway: String,
    /// Nanoseconds since epoch.
    #[serde(default)]
    pub timestamp: u64,
    /// RSSI in dBm.
    #[serde(default)]
    pub signal: i32,
    #[serde(default)]
    pub snr: f64,
    /// Validity as judged by the chain, when the API reports it.
    #[serde(default)]
    pub is_valid: Option<bool>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub packet_hash: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
}

/// Direct receipt reported by the challengee itself.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default)]
    pub signal: i32,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub gateway: String,
    #[serde(default)]
    pub data: Option<String>,
}

/// Reverse-geocoded location of a challengee.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Geocode {
    #[serde(default)]
    pub short_street: Option<String>,
    #[serde(default)]
    pub short_state: Option<String>,
    #[serde(default)]
    pub short_country: Option<String>,
    #[serde(default)]
    pub short_city: Option<String>,
    #[serde(default, rename = "long_street")]
    pub street: Option<String>,
    #[serde(default, rename = "long_state")]
    pub state: Option<String>,
    #[serde(default, rename = "long_country")]
    pub country: Option<String>,
    #[serde(default, rename = "long_city")]
    pub city: Option<String>,
}

impl ChallengeRecord {
    /// Whether this record is a `poc_receipts_v1` event.
    pub fn is_poc_receipt(&self) -> bool {
        self.kind == POC_RECEIPTS_V1
    }

    /// All path segments; empty when the API sent no path.
    pub fn segments(&self) -> &[PathSegment] {
        self.path.as_deref().unwrap_or_default()
    }

    /// Segment 0, the only segment the analytics inspect for beacon ownership.
    pub fn first_segment(&self) -> Option<&PathSegment> {
        self.segments().first()
    }

    /// Event time in nanoseconds, taken from segment 0's receipt or else from
    /// its first witness.
    pub fn event_time_nanos(&self) -> Result<u64, TypesError> {
        let segment = self.first_segment().ok_or_else(|| TypesError::MissingPath {
            kind: self.kind.clone(),
            height: self.height,
        })?;

        if let Some(receipt) = &segment.receipt {
            return Ok(receipt.timestamp);
        }
        if let Some(witness) = segment.witnesses().first() {
            return Ok(witness.timestamp);
        }

        Err(TypesError::MissingEventTime {
            kind: self.kind.clone(),
            height: self.height,
        })
    }

    /// Event time truncated to seconds; this is the record's cache key.
    pub fn event_time(&self) -> Result<Timestamp, TypesError> {
        self.event_time_nanos().map(Timestamp::from_nanos)
    }
}

impl PathSegment {
    /// Witnesses of this segment; empty when none were reported.
    pub fn witnesses(&self) -> &[WitnessObservation] {
        self.witnesses.as_deref().unwrap_or_default()
    }
}

impl WitnessObservation {
    /// Chain validity, treating an unreported flag as invalid.
    pub fn is_valid(&self) -> bool {
        self.is_valid.unwrap_or(false)
    }
}
