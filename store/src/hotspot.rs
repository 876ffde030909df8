//! Hotspot directory storage trait.

use hotspot_types::Hotspot;

use crate::StoreError;

/// Persistent address -> hotspot and name -> address maps.
pub trait HotspotStore {
    /// Get a hotspot by address.
    fn get_hotspot(&self, address: &str) -> Result<Option<Hotspot>, StoreError>;

    /// Look up the address bound to a normalised name.
    fn address_for_name(&self, name: &str) -> Result<Option<String>, StoreError>;

    /// Upsert every hotspot and bind its name in one transaction.
    ///
    /// Names are write-once: binding a name that already belongs to a different
    /// address fails with [`StoreError::NameCollision`] and nothing is written.
    /// When `height` is given it is recorded as the directory height.
    fn replace_all(&self, hotspots: &[Hotspot], height: Option<u64>) -> Result<usize, StoreError>;

    /// Every stored hotspot, sorted by address.
    fn iter_hotspots(&self) -> Result<Vec<Hotspot>, StoreError>;

    /// Every `(name, address)` binding, sorted by name.
    fn iter_names(&self) -> Result<Vec<(String, String)>, StoreError>;

    /// Chain height recorded by the last directory refresh.
    fn directory_height(&self) -> Result<Option<u64>, StoreError>;
}
