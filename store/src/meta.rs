//! Metadata storage trait.

use crate::StoreError;

/// Database bookkeeping. The directory height lives beside the schema
/// version but is written through [`crate::HotspotStore::replace_all`].
pub trait MetaStore {
    /// Get the database schema version; 0 for a fresh database.
    fn get_schema_version(&self) -> Result<u32, StoreError>;

    /// Set the database schema version.
    fn set_schema_version(&self, version: u32) -> Result<(), StoreError>;
}
