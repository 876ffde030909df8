//! Derived analytics results. Computed from cached records, never persisted.

use serde::{Deserialize, Serialize};

/// Which way a beacon travelled relative to the hotspot under analysis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// The observer heard the peer's beacon.
    #[serde(rename = "RX")]
    Rx,
    /// The peer heard the observer's beacon.
    #[serde(rename = "TX")]
    Tx,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rx => "RX",
            Self::Tx => "TX",
        }
    }
}

/// One witness observation between an observer and a peer, annotated with
/// distance and the validity threshold for its SNR.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WitnessResult {
    /// Witness timestamp, nanoseconds since epoch.
    pub timestamp: u64,
    pub address: String,
    pub witness: String,
    #[serde(rename = "type")]
    pub direction: Direction,
    pub signal: i32,
    pub snr: f64,
    pub valid: bool,
    pub km: f64,
    pub mi: f64,
    /// Minimum valid RSSI for this SNR; `None` when the SNR has no table entry.
    pub valid_threshold: Option<i32>,
    pub location: Option<String>,
    pub hash: String,
}

/// Simplified observation used for coarse signal time series.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChallengeResult {
    /// Nanoseconds since epoch.
    pub timestamp: u64,
    pub address: String,
    pub signal: i32,
    pub location: Option<String>,
}

/// Valid/invalid witness totals for one beacon.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconCounts {
    /// Seconds since epoch.
    pub timestamp: u64,
    pub hash: String,
    pub valid: u32,
    pub invalid: u32,
}

/// Distance to a challengee whose beacon the hotspot witnessed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistancePoint {
    /// Seconds since epoch.
    pub timestamp: u64,
    pub challengee: String,
    pub km: f64,
    pub valid: bool,
}
