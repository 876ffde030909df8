//! Abstract storage traits for the challenge cache and hotspot directory.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The cache, directory and CLI depend only on the traits.

pub mod challenge;
pub mod error;
pub mod hotspot;
pub mod meta;

pub use challenge::{CacheSpan, ChallengeBatch, ChallengeStore, ChallengeSummary, DeleteRange};
pub use error::StoreError;
pub use hotspot::HotspotStore;
pub use meta::MetaStore;
