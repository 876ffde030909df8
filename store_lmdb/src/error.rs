use thiserror::Error;

use hotspot_store::StoreError;

#[derive(Debug, Error)]
pub enum LmdbError {
    #[error("LMDB error: {0}")]
    Heed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("hotspot name '{name}' is already bound to {existing}, refusing to rebind to {attempted}")]
    NameCollision {
        name: String,
        existing: String,
        attempted: String,
    },
}

impl From<heed::Error> for LmdbError {
    fn from(e: heed::Error) -> Self {
        Self::Heed(e.to_string())
    }
}

impl From<bincode::Error> for LmdbError {
    fn from(e: bincode::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<hotspot_types::TypesError> for LmdbError {
    fn from(e: hotspot_types::TypesError) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<LmdbError> for StoreError {
    fn from(e: LmdbError) -> Self {
        match e {
            LmdbError::Serialization(msg) => StoreError::Serialization(msg),
            LmdbError::NameCollision {
                name,
                existing,
                attempted,
            } => StoreError::NameCollision {
                name,
                existing,
                attempted,
            },
            other => StoreError::Backend(other.to_string()),
        }
    }
}
