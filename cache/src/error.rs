use thiserror::Error;

use hotspot_client::FetchError;
use hotspot_store::StoreError;
use hotspot_types::Timestamp;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("invalid window: {first} is after {last}")]
    InvalidWindow { first: Timestamp, last: Timestamp },
}
