use thiserror::Error;

use hotspot_client::FetchError;
use hotspot_store::StoreError;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("directory refresh failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("unknown hotspot: {0}")]
    UnknownHotspot(String),
}
