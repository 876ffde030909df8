use std::collections::HashMap;

use hotspot_directory::{DirectoryError, HotspotDirectory};
use hotspot_store::HotspotStore;
use hotspot_types::Hotspot;

use crate::AnalysisError;

/// Source of hotspot metadata for the analytics.
///
/// Takes `&mut self` so memoizing implementations can fill their cache.
pub trait HotspotLookup {
    fn lookup(&mut self, address: &str) -> Result<Option<Hotspot>, AnalysisError>;
}

impl<S: HotspotStore> HotspotLookup for HotspotDirectory<S> {
    fn lookup(&mut self, address: &str) -> Result<Option<Hotspot>, AnalysisError> {
        HotspotDirectory::lookup(self, address).map_err(|e| match e {
            DirectoryError::UnknownHotspot(address) => AnalysisError::UnknownHotspot(address),
            other => AnalysisError::Lookup(other.to_string()),
        })
    }
}

impl HotspotLookup for HashMap<String, Hotspot> {
    fn lookup(&mut self, address: &str) -> Result<Option<Hotspot>, AnalysisError> {
        Ok(self.get(address).cloned())
    }
}

impl<L: HotspotLookup + ?Sized> HotspotLookup for &mut L {
    fn lookup(&mut self, address: &str) -> Result<Option<Hotspot>, AnalysisError> {
        (**self).lookup(address)
    }
}
