//! LMDB implementation of HotspotStore.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use hotspot_store::hotspot::HotspotStore;
use hotspot_store::StoreError;
use hotspot_types::{normalize_name, Hotspot};

use crate::LmdbError;

const DIRECTORY_HEIGHT_KEY: &[u8] = b"directory_height";

pub struct LmdbHotspotStore {
    pub(crate) env: Arc<Env>,
    pub(crate) hotspots_db: Database<Bytes, Bytes>,
    pub(crate) names_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

fn utf8(bytes: &[u8]) -> Result<String, LmdbError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| LmdbError::Serialization(e.to_string()))
}

impl HotspotStore for LmdbHotspotStore {
    fn get_hotspot(&self, address: &str) -> Result<Option<Hotspot>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let Some(bytes) = self
            .hotspots_db
            .get(&rtxn, address.as_bytes())
            .map_err(LmdbError::from)?
        else {
            return Ok(None);
        };
        let hotspot = bincode::deserialize(bytes).map_err(LmdbError::from)?;
        Ok(Some(hotspot))
    }

    fn address_for_name(&self, name: &str) -> Result<Option<String>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .names_db
            .get(&rtxn, normalize_name(name).as_bytes())
            .map_err(LmdbError::from)?;
        Ok(val.map(utf8).transpose()?)
    }

    fn replace_all(&self, hotspots: &[Hotspot], height: Option<u64>) -> Result<usize, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;

        for hotspot in hotspots {
            let bytes = bincode::serialize(hotspot).map_err(LmdbError::from)?;
            self.hotspots_db
                .put(&mut wtxn, hotspot.address.as_bytes(), &bytes)
                .map_err(LmdbError::from)?;

            let name = normalize_name(&hotspot.name);
            if name.is_empty() {
                continue;
            }
            let existing = self
                .names_db
                .get(&wtxn, name.as_bytes())
                .map_err(LmdbError::from)?
                .map(utf8)
                .transpose()?;
            match existing {
                Some(existing) if existing == hotspot.address => {}
                Some(existing) => {
                    // Returning drops `wtxn`, aborting every write above.
                    return Err(LmdbError::NameCollision {
                        name,
                        existing,
                        attempted: hotspot.address.clone(),
                    }
                    .into());
                }
                None => {
                    self.names_db
                        .put(&mut wtxn, name.as_bytes(), hotspot.address.as_bytes())
                        .map_err(LmdbError::from)?;
                }
            }
        }

        if let Some(height) = height {
            self.meta_db
                .put(&mut wtxn, DIRECTORY_HEIGHT_KEY, &height.to_be_bytes())
                .map_err(LmdbError::from)?;
        }

        wtxn.commit().map_err(LmdbError::from)?;
        Ok(hotspots.len())
    }

    fn iter_hotspots(&self) -> Result<Vec<Hotspot>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut hotspots = Vec::new();
        for result in self.hotspots_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (_, val) = result.map_err(LmdbError::from)?;
            hotspots.push(bincode::deserialize(val).map_err(LmdbError::from)?);
        }
        Ok(hotspots)
    }

    fn iter_names(&self) -> Result<Vec<(String, String)>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut names = Vec::new();
        for result in self.names_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (key, val) = result.map_err(LmdbError::from)?;
            names.push((utf8(key)?, utf8(val)?));
        }
        Ok(names)
    }

    fn directory_height(&self) -> Result<Option<u64>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .meta_db
            .get(&rtxn, DIRECTORY_HEIGHT_KEY)
            .map_err(LmdbError::from)?;
        match val {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.try_into().map_err(|_| {
                    StoreError::Corruption("directory_height has unexpected byte length".into())
                })?;
                Ok(Some(u64::from_be_bytes(arr)))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LmdbEnvironment;

    fn temp_env() -> (tempfile::TempDir, LmdbEnvironment) {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let env = LmdbEnvironment::open(dir.path(), 16, 10 * 1024 * 1024)
            .expect("failed to open env");
        (dir, env)
    }

    fn hotspot(address: &str, name: &str) -> Hotspot {
        Hotspot {
            address: address.into(),
            name: name.into(),
            lat: Some(37.77),
            lng: Some(-122.41),
            block_added: 1000,
            ..Default::default()
        }
    }

    #[test]
    fn replace_all_stores_hotspots_and_names() {
        let (_dir, env) = temp_env();
        let store = env.hotspot_store();

        let n = store
            .replace_all(
                &[hotspot("addr1", "Angry Purple Tiger"), hotspot("addr2", "calm-blue-fox")],
                Some(1234),
            )
            .unwrap();
        assert_eq!(n, 2);

        assert_eq!(store.get_hotspot("addr1").unwrap().unwrap().block_added, 1000);
        assert_eq!(store.get_hotspot("missing").unwrap(), None);
        assert_eq!(
            store.address_for_name("angry-purple-tiger").unwrap().as_deref(),
            Some("addr1")
        );
        assert_eq!(
            store.address_for_name("Calm Blue Fox").unwrap().as_deref(),
            Some("addr2")
        );
        assert_eq!(store.directory_height().unwrap(), Some(1234));
        assert_eq!(store.iter_hotspots().unwrap().len(), 2);
        assert_eq!(
            store.iter_names().unwrap(),
            vec![
                ("angry-purple-tiger".to_string(), "addr1".to_string()),
                ("calm-blue-fox".to_string(), "addr2".to_string()),
            ]
        );
    }

    #[test]
    fn replace_all_upserts_metadata() {
        let (_dir, env) = temp_env();
        let store = env.hotspot_store();
        store.replace_all(&[hotspot("addr1", "a-b-c")], None).unwrap();

        let mut updated = hotspot("addr1", "a-b-c");
        updated.block = 99;
        store.replace_all(&[updated], None).unwrap();

        assert_eq!(store.get_hotspot("addr1").unwrap().unwrap().block, 99);
        assert_eq!(store.directory_height().unwrap(), None);
    }

    #[test]
    fn name_collision_aborts_whole_batch() {
        let (_dir, env) = temp_env();
        let store = env.hotspot_store();
        store.replace_all(&[hotspot("addr1", "a-b-c")], Some(1)).unwrap();

        let err = store
            .replace_all(&[hotspot("addr2", "x-y-z"), hotspot("addr3", "a-b-c")], Some(2))
            .unwrap_err();
        assert!(matches!(err, StoreError::NameCollision { ref existing, .. } if existing == "addr1"));

        assert_eq!(store.get_hotspot("addr2").unwrap(), None);
        assert_eq!(store.address_for_name("x-y-z").unwrap(), None);
        assert_eq!(store.address_for_name("a-b-c").unwrap().as_deref(), Some("addr1"));
        assert_eq!(store.directory_height().unwrap(), Some(1));
    }

    #[test]
    fn empty_names_are_not_indexed() {
        let (_dir, env) = temp_env();
        let store = env.hotspot_store();
        store
            .replace_all(&[hotspot("addr1", ""), hotspot("addr2", "")], None)
            .unwrap();
        assert!(store.iter_names().unwrap().is_empty());
        assert_eq!(store.iter_hotspots().unwrap().len(), 2);
    }
}
