use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("hotspot name '{name}' is already bound to {existing}, refusing to rebind to {attempted}")]
    NameCollision {
        name: String,
        existing: String,
        attempted: String,
    },

    #[error("database schema version {found} does not match expected {expected}")]
    SchemaMismatch { found: u32, expected: u32 },

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("database is corrupted: {0}")]
    Corruption(String),
}
