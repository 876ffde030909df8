//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use hotspot_store::StoreError;

use crate::challenge::LmdbChallengeStore;
use crate::hotspot::LmdbHotspotStore;
use crate::meta::LmdbMetaStore;
use crate::schema;
use crate::LmdbError;

/// Room for the fixed databases plus one challenge namespace per hotspot.
pub const DEFAULT_MAX_DBS: u32 = 4096;

/// Wraps the LMDB environment and the fixed database handles.
///
/// Challenge namespaces are opened per hotspot on demand, so `max_dbs` bounds
/// how many distinct hotspots can be cached.
pub struct LmdbEnvironment {
    env: Arc<Env>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
    pub(crate) hotspots_db: Database<Bytes, Bytes>,
    pub(crate) names_db: Database<Bytes, Bytes>,
    pub(crate) challenge_index_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path and verify its
    /// schema version. A version mismatch is returned as
    /// [`StoreError::SchemaMismatch`]; callers must not continue.
    pub fn open(path: &Path, max_dbs: u32, map_size: usize) -> Result<Self, StoreError> {
        std::fs::create_dir_all(path).map_err(LmdbError::from)?;

        // SAFETY: the environment is opened once per process for this path and
        // the data file is never modified by anything else while it is open.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(max_dbs)
                .open(path)
        }
        .map_err(LmdbError::from)?;

        let mut wtxn = env.write_txn().map_err(LmdbError::from)?;
        let meta_db = env
            .create_database(&mut wtxn, Some("meta"))
            .map_err(LmdbError::from)?;
        let hotspots_db = env
            .create_database(&mut wtxn, Some("hotspots"))
            .map_err(LmdbError::from)?;
        let names_db = env
            .create_database(&mut wtxn, Some("names"))
            .map_err(LmdbError::from)?;
        let challenge_index_db = env
            .create_database(&mut wtxn, Some("challenge_index"))
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;

        let lmdb = Self {
            env: Arc::new(env),
            meta_db,
            hotspots_db,
            names_db,
            challenge_index_db,
        };

        schema::check_schema(&lmdb.meta_store())?;
        tracing::debug!(path = %path.display(), max_dbs, map_size, "opened LMDB environment");
        Ok(lmdb)
    }

    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }

    pub fn challenge_store(&self) -> LmdbChallengeStore {
        LmdbChallengeStore {
            env: Arc::clone(&self.env),
            index_db: self.challenge_index_db,
        }
    }

    pub fn hotspot_store(&self) -> LmdbHotspotStore {
        LmdbHotspotStore {
            env: Arc::clone(&self.env),
            hotspots_db: self.hotspots_db,
            names_db: self.names_db,
            meta_db: self.meta_db,
        }
    }

    pub fn meta_store(&self) -> LmdbMetaStore {
        LmdbMetaStore {
            env: Arc::clone(&self.env),
            meta_db: self.meta_db,
        }
    }
}
