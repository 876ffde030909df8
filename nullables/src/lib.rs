//! Nullable infrastructure for deterministic testing.
//!
//! Every external dependency (clock, sleeping, the remote API, storage) sits
//! behind a trait. This crate provides test-friendly implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod fixtures;
pub mod network;
pub mod store;

pub use clock::{NullClock, NullSleeper};
pub use network::{NullChallengeSource, NullDirectorySource};
pub use store::{NullChallengeStore, NullHotspotStore};
