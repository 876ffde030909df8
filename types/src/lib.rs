//! Fundamental types for hotspot challenge analysis.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! raw proof-of-coverage challenge records as served by the remote API, hotspot
//! metadata, timestamps, and the derived per-peer analytics results.

pub mod challenge;
pub mod error;
pub mod hotspot;
pub mod results;
pub mod time;

pub use challenge::{
    ChallengeRecord, Geocode, PathSegment, Receipt, WitnessObservation, POC_RECEIPTS_V1,
};
pub use error::TypesError;
pub use hotspot::{normalize_name, Hotspot, HotspotStatus};
pub use results::{BeaconCounts, ChallengeResult, Direction, DistancePoint, WitnessResult};
pub use time::Timestamp;
