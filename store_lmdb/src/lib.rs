//! LMDB storage backend for the hotspot analysis cache.
//!
//! Implements all storage traits from `hotspot-store` using the `heed` LMDB
//! bindings. Fixed databases hold metadata and the hotspot directory; every
//! hotspot's challenges live in a named database of their own.

pub mod challenge;
pub mod environment;
pub mod error;
pub mod hotspot;
pub mod meta;
pub mod schema;

pub use challenge::{LmdbChallengeBatch, LmdbChallengeStore};
pub use environment::{LmdbEnvironment, DEFAULT_MAX_DBS};
pub use error::LmdbError;
pub use hotspot::LmdbHotspotStore;
pub use meta::LmdbMetaStore;
pub use schema::CURRENT_SCHEMA_VERSION;
