//! Timestamp type used for cache keys and reconciliation windows.
//!
//! Timestamps are Unix epoch seconds (UTC). Raw challenge records carry
//! nanosecond event times; those are truncated to whole seconds when they become
//! cache keys, so two events inside the same second share a key.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::TypesError;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// A Unix timestamp in seconds since epoch (UTC).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The epoch (time zero).
    pub const EPOCH: Self = Self(0);

    /// The largest representable time, used as an open upper bound.
    pub const MAX: Self = Self(u64::MAX);

    pub fn new(secs: u64) -> Self {
        Self(secs)
    }

    /// Truncate a nanosecond event time to whole seconds.
    pub fn from_nanos(nanos: u64) -> Self {
        Self(nanos / NANOS_PER_SEC)
    }

    /// Get the current system time as a `Timestamp`.
    ///
    /// A clock set before the epoch reads as the epoch.
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Seconds elapsed since this timestamp (relative to `now`).
    pub fn elapsed_since(&self, now: Timestamp) -> u64 {
        now.0.saturating_sub(self.0)
    }

    /// `self - duration`, clamped at the epoch.
    pub fn saturating_sub(&self, duration: Duration) -> Self {
        Self(self.0.saturating_sub(duration.as_secs()))
    }

    /// `self + duration`, clamped at [`Timestamp::MAX`].
    pub fn saturating_add(&self, duration: Duration) -> Self {
        Self(self.0.saturating_add(duration.as_secs()))
    }

    /// Big-endian key bytes. Byte order equals chronological order.
    pub fn to_key(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Decode a big-endian key produced by [`Timestamp::to_key`].
    pub fn from_key(bytes: &[u8]) -> Result<Self, TypesError> {
        let arr: [u8; 8] = bytes
            .try_into()
            .map_err(|_| TypesError::InvalidKey(bytes.len()))?;
        Ok(Self(u64::from_be_bytes(arr)))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}
