//! Time-range cache of challenge records.
//!
//! Each hotspot's records are stored keyed by event time. [`TimeRangeCache`]
//! decides how much of the remote history must be fetched to cover a
//! requested window, writes only what is new, and serves range queries.

pub mod cache;
pub mod error;
pub mod plan;

pub use cache::{ReconcileOutcome, TimeRangeCache, Window};
pub use error::CacheError;
pub use plan::{plan, FetchReason, ReconcilePlan};
