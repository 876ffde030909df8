//! Errors raised while interpreting raw records.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("no path: unable to determine timestamp for {kind}@{height}")]
    MissingPath { kind: String, height: u64 },

    #[error("no receipt or witness: unable to determine timestamp for {kind}@{height}")]
    MissingEventTime { kind: String, height: u64 },

    #[error("invalid timestamp key: expected 8 bytes, got {0}")]
    InvalidKey(usize),
}
