use std::collections::HashMap;

use hotspot_client::{DirectorySource, Fetcher};
use hotspot_store::HotspotStore;
use hotspot_types::{normalize_name, Hotspot};

use crate::DirectoryError;

/// Whether `identifier` has the shape of a hotspot name: three words joined
/// by hyphens or spaces. Addresses are single base58 tokens.
pub fn looks_like_name(identifier: &str) -> bool {
    normalize_name(identifier).split('-').count() == 3
}

/// Memoized view of the persistent hotspot directory.
///
/// Lookups that miss the in-memory maps read through to the store and
/// populate the maps. Not synchronized: share behind a lock if needed.
pub struct HotspotDirectory<S> {
    store: S,
    by_address: HashMap<String, Hotspot>,
    by_name: HashMap<String, String>,
}

impl<S: HotspotStore> HotspotDirectory<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            by_address: HashMap::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Resolve an address or name to an address.
    ///
    /// Name-shaped identifiers are tried as names first, anything else as an
    /// address first; each falls back to the other interpretation.
    pub fn resolve(&mut self, identifier: &str) -> Result<String, DirectoryError> {
        let identifier = identifier.trim();
        let resolved = if looks_like_name(identifier) {
            match self.address_of(identifier)? {
                Some(address) => Some(address),
                None => self.lookup(identifier)?.map(|h| h.address),
            }
        } else {
            match self.lookup(identifier)? {
                Some(hotspot) => Some(hotspot.address),
                None => self.address_of(identifier)?,
            }
        };
        resolved.ok_or_else(|| DirectoryError::UnknownHotspot(identifier.to_string()))
    }

    /// Metadata for `address`, `None` when unknown.
    pub fn lookup(&mut self, address: &str) -> Result<Option<Hotspot>, DirectoryError> {
        if let Some(hotspot) = self.by_address.get(address) {
            return Ok(Some(hotspot.clone()));
        }
        tracing::trace!(address, "hotspot cache miss");
        let hotspot = self.store.get_hotspot(address)?;
        if let Some(hotspot) = &hotspot {
            self.by_address.insert(address.to_string(), hotspot.clone());
        }
        Ok(hotspot)
    }

    /// Metadata for `address`, failing when unknown.
    pub fn get(&mut self, address: &str) -> Result<Hotspot, DirectoryError> {
        self.lookup(address)?
            .ok_or_else(|| DirectoryError::UnknownHotspot(address.to_string()))
    }

    /// Like [`Self::get`], but asks the remote directory for hotspots the
    /// store does not know and stores the answer.
    pub fn get_or_fetch<D: DirectorySource>(
        &mut self,
        address: &str,
        fetcher: &Fetcher<D>,
    ) -> Result<Hotspot, DirectoryError> {
        if let Some(hotspot) = self.lookup(address)? {
            return Ok(hotspot);
        }
        let hotspot = fetcher
            .fetch_hotspot(address)?
            .ok_or_else(|| DirectoryError::UnknownHotspot(address.to_string()))?;
        self.store.replace_all(std::slice::from_ref(&hotspot), None)?;
        self.invalidate();
        Ok(hotspot)
    }

    pub fn name_of(&mut self, address: &str) -> Result<Option<String>, DirectoryError> {
        Ok(self
            .lookup(address)?
            .map(|h| h.name)
            .filter(|n| !n.is_empty()))
    }

    /// Address bound to `name`. Accepts any spacing or case of the name.
    pub fn address_of(&mut self, name: &str) -> Result<Option<String>, DirectoryError> {
        let name = normalize_name(name);
        if let Some(address) = self.by_name.get(&name) {
            return Ok(Some(address.clone()));
        }
        let address = self.store.address_for_name(&name)?;
        if let Some(address) = &address {
            self.by_name.insert(name, address.clone());
        }
        Ok(address)
    }

    /// Upsert `hotspots` and bind their names in one store transaction, then
    /// drop the in-memory cache. A name already bound to another address
    /// aborts the whole replacement.
    pub fn set_all(&mut self, hotspots: &[Hotspot], height: Option<u64>) -> Result<usize, DirectoryError> {
        let count = self.store.replace_all(hotspots, height)?;
        self.invalidate();
        tracing::info!(count, ?height, "replaced hotspot directory");
        Ok(count)
    }

    /// Import an exported hotspot list without touching the recorded height.
    pub fn import(&mut self, hotspots: &[Hotspot]) -> Result<usize, DirectoryError> {
        self.set_all(hotspots, None)
    }

    /// Chain height recorded by the last refresh.
    pub fn height(&self) -> Result<Option<u64>, DirectoryError> {
        Ok(self.store.directory_height()?)
    }

    /// True when no refresh was ever recorded or the directory lags
    /// `current_height` by more than `max_lag` blocks.
    pub fn needs_refresh(&self, current_height: u64, max_lag: u64) -> Result<bool, DirectoryError> {
        Ok(match self.height()? {
            None => true,
            Some(height) => current_height.saturating_sub(height) > max_lag,
        })
    }

    /// Download the full directory and bulk-replace, recording the chain
    /// height read before the download.
    pub fn refresh<D: DirectorySource>(&mut self, fetcher: &Fetcher<D>) -> Result<usize, DirectoryError> {
        let height = fetcher.current_height()?;
        let hotspots = fetcher.fetch_hotspots()?;
        self.set_all(&hotspots, Some(height))
    }

    /// Refresh only when [`Self::needs_refresh`] says so. Returns whether a
    /// refresh happened.
    pub fn refresh_if_stale<D: DirectorySource>(
        &mut self,
        fetcher: &Fetcher<D>,
        max_lag: u64,
    ) -> Result<bool, DirectoryError> {
        let current = fetcher.current_height()?;
        if !self.needs_refresh(current, max_lag)? {
            tracing::debug!(current, "hotspot directory is current");
            return Ok(false);
        }
        self.refresh(fetcher)?;
        Ok(true)
    }

    /// Every stored hotspot.
    pub fn all(&self) -> Result<Vec<Hotspot>, DirectoryError> {
        Ok(self.store.iter_hotspots()?)
    }

    /// Every `(name, address)` binding.
    pub fn names(&self) -> Result<Vec<(String, String)>, DirectoryError> {
        Ok(self.store.iter_names()?)
    }

    fn invalidate(&mut self) {
        self.by_address.clear();
        self.by_name.clear();
    }
}
