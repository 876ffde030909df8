use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("unknown hotspot: {0}")]
    UnknownHotspot(String),

    #[error("hotspot lookup failed: {0}")]
    Lookup(String),
}
