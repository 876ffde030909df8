//! Witness analytics.
//!
//! Turns cached challenge records into per-peer signal series annotated with
//! distance and validity thresholds:
//! - [`geo`]: great-circle distance between hotspots
//! - [`validity`]: free-space max RSSI and the SNR to min-RSSI table
//! - [`witness`]: RX/TX classification, beacon counts, coarse series
//! - [`report`]: per-peer numeric series for a renderer

pub mod error;
pub mod geo;
pub mod lookup;
pub mod report;
pub mod validity;
pub mod witness;

pub use error::AnalysisError;
pub use geo::{distance, hotspot_distance, Distance};
pub use lookup::HotspotLookup;
pub use report::{merge_descending, DirectionSeries, PeerReport, SeriesPoint};
pub use validity::{max_rssi, min_rssi_for_snr};
pub use witness::{
    beacon_validity, rx_results, signal_series, time_for_height, tx_results, unique_peers,
    WitnessEngine,
};
