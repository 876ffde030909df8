//! Hotspot directory.
//!
//! Resolves hotspot identifiers (addresses or three-word names) to metadata.
//! The persistent [`HotspotStore`](hotspot_store::HotspotStore) is shadowed
//! by an in-memory cache owned by the [`HotspotDirectory`] value; bulk
//! replacement invalidates it.

pub mod directory;
pub mod error;

pub use directory::{looks_like_name, HotspotDirectory};
pub use error::DirectoryError;
