//! Database schema version guard.
//!
//! The layout carries a single version tag in the meta database. A fresh
//! database is stamped with the current version; any other stored version is
//! refused outright. There are no in-place migrations.

use hotspot_store::{MetaStore, StoreError};

/// The schema version that the current code expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Check the stored schema version, stamping a fresh database.
///
/// - Version 0 means a fresh database (no version stored yet).
/// - A stored version equal to [`CURRENT_SCHEMA_VERSION`] is accepted.
/// - Anything else fails with [`StoreError::SchemaMismatch`].
pub fn check_schema(meta_store: &impl MetaStore) -> Result<(), StoreError> {
    check_schema_version(meta_store, CURRENT_SCHEMA_VERSION)
}

fn check_schema_version(meta_store: &impl MetaStore, expected: u32) -> Result<(), StoreError> {
    let found = meta_store.get_schema_version()?;

    if found == 0 {
        meta_store.set_schema_version(expected)?;
        tracing::info!(version = expected, "initialised database schema");
        return Ok(());
    }

    if found != expected {
        tracing::error!(found, expected, "database schema version mismatch");
        return Err(StoreError::SchemaMismatch { found, expected });
    }

    tracing::debug!(version = found, "database schema is up to date");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LmdbEnvironment;

    #[test]
    fn fresh_database_is_stamped() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 16, 10 * 1024 * 1024).unwrap();
        assert_eq!(
            env.meta_store().get_schema_version().unwrap(),
            CURRENT_SCHEMA_VERSION
        );
    }

    #[test]
    fn reopening_with_same_version_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        drop(LmdbEnvironment::open(dir.path(), 16, 10 * 1024 * 1024).unwrap());
        assert!(LmdbEnvironment::open(dir.path(), 16, 10 * 1024 * 1024).is_ok());
    }

    #[test]
    fn mismatched_version_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        {
            let env = LmdbEnvironment::open(dir.path(), 16, 10 * 1024 * 1024).unwrap();
            env.meta_store()
                .set_schema_version(CURRENT_SCHEMA_VERSION + 1)
                .unwrap();
        }
        let err = LmdbEnvironment::open(dir.path(), 16, 10 * 1024 * 1024)
            .err()
            .expect("open should fail");
        assert!(matches!(
            err,
            StoreError::SchemaMismatch { found, expected }
                if found == CURRENT_SCHEMA_VERSION + 1 && expected == CURRENT_SCHEMA_VERSION
        ));
    }

    #[test]
    fn check_against_other_expected_version() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 16, 10 * 1024 * 1024).unwrap();
        let meta = env.meta_store();
        assert!(check_schema_version(&meta, CURRENT_SCHEMA_VERSION).is_ok());
        assert!(check_schema_version(&meta, CURRENT_SCHEMA_VERSION + 7).is_err());
    }
}
