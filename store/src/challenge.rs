//! Challenge storage trait.
//!
//! Each hotspot owns an ordered namespace of challenge records keyed by
//! event-time seconds. Writes go through a [`ChallengeBatch`] so a whole
//! reconciliation commits or rolls back together.

use hotspot_types::{ChallengeRecord, Timestamp};

use crate::StoreError;

/// Earliest and latest stored keys of one hotspot namespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheSpan {
    pub first: Timestamp,
    pub last: Timestamp,
}

impl CacheSpan {
    /// Whether `ts` lies inside `[first, last]`.
    pub fn contains(&self, ts: Timestamp) -> bool {
        self.first <= ts && ts <= self.last
    }
}

/// Which side of a cutoff to delete.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteRange {
    /// Remove keys strictly before the cutoff.
    Before(Timestamp),
    /// Remove keys at or after the cutoff.
    After(Timestamp),
}

/// Per-namespace totals for `challenges list`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChallengeSummary {
    pub address: String,
    pub count: u64,
    pub first: Option<Timestamp>,
    pub last: Option<Timestamp>,
}

/// An open write transaction over one hotspot namespace.
///
/// Dropping a batch without calling [`ChallengeBatch::commit`] discards every
/// write made through it.
pub trait ChallengeBatch {
    /// Span of the namespace as seen by this transaction.
    fn span(&self) -> Result<Option<CacheSpan>, StoreError>;

    /// Store `record` under `ts`, replacing any record with the same key.
    fn put(&mut self, ts: Timestamp, record: &ChallengeRecord) -> Result<(), StoreError>;

    /// Commit all writes, returning how many records were put.
    fn commit(self) -> Result<usize, StoreError>;
}

/// Trait for per-hotspot challenge storage.
pub trait ChallengeStore {
    type Batch<'a>: ChallengeBatch
    where
        Self: 'a;

    /// Open a write batch on the namespace for `address`, creating it if needed.
    fn begin_batch(&self, address: &str) -> Result<Self::Batch<'_>, StoreError>;

    /// Earliest and latest stored keys, `None` when the namespace is empty or absent.
    fn span(&self, address: &str) -> Result<Option<CacheSpan>, StoreError>;

    /// Records with `first <= key <= last`, ascending.
    fn range(
        &self,
        address: &str,
        first: Timestamp,
        last: Timestamp,
    ) -> Result<Vec<(Timestamp, ChallengeRecord)>, StoreError>;

    /// Delete one side of a cutoff. Returns the number of records removed.
    fn delete_range(&self, address: &str, range: DeleteRange) -> Result<usize, StoreError>;

    /// Delete every record for `address`. Returns the number removed.
    fn delete_all(&self, address: &str) -> Result<usize, StoreError>;

    /// Summary of every hotspot namespace, sorted by address.
    fn summaries(&self) -> Result<Vec<ChallengeSummary>, StoreError>;
}
