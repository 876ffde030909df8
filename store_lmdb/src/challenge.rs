//! LMDB implementation of ChallengeStore.
//!
//! Each hotspot's records live in a named database `challenges:<address>`,
//! keyed by 8-byte big-endian event seconds so a cursor walk is chronological.
//! The `challenge_index` database lists every address that owns a namespace.

use std::ops::Bound;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, RoTxn, RwTxn};

use hotspot_store::challenge::{
    CacheSpan, ChallengeBatch, ChallengeStore, ChallengeSummary, DeleteRange,
};
use hotspot_store::StoreError;
use hotspot_types::{ChallengeRecord, Timestamp};

use crate::LmdbError;

const NAMESPACE_PREFIX: &str = "challenges:";

fn namespace(address: &str) -> String {
    format!("{NAMESPACE_PREFIX}{address}")
}

type ChallengeDb = Database<Bytes, Bytes>;

pub struct LmdbChallengeStore {
    pub(crate) env: Arc<Env>,
    pub(crate) index_db: Database<Bytes, Bytes>,
}

impl LmdbChallengeStore {
    fn open_namespace(
        &self,
        rtxn: &RoTxn,
        address: &str,
    ) -> Result<Option<ChallengeDb>, LmdbError> {
        Ok(self.env.open_database(rtxn, Some(&namespace(address)))?)
    }
}

fn span_of(db: &ChallengeDb, txn: &RoTxn) -> Result<Option<CacheSpan>, LmdbError> {
    let first = db.first(txn)?.map(|(k, _)| Timestamp::from_key(k)).transpose()?;
    let last = db.last(txn)?.map(|(k, _)| Timestamp::from_key(k)).transpose()?;
    Ok(match (first, last) {
        (Some(first), Some(last)) => Some(CacheSpan { first, last }),
        _ => None,
    })
}

impl ChallengeStore for LmdbChallengeStore {
    type Batch<'a> = LmdbChallengeBatch<'a>
    where
        Self: 'a;

    fn begin_batch(&self, address: &str) -> Result<Self::Batch<'_>, StoreError> {
        let mut txn = self.env.write_txn().map_err(LmdbError::from)?;
        let db = self
            .env
            .create_database(&mut txn, Some(&namespace(address)))
            .map_err(LmdbError::from)?;
        Ok(LmdbChallengeBatch {
            txn,
            db,
            index_db: self.index_db,
            address: address.to_string(),
            written: 0,
        })
    }

    fn span(&self, address: &str) -> Result<Option<CacheSpan>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self.open_namespace(&rtxn, address)? {
            Some(db) => Ok(span_of(&db, &rtxn)?),
            None => Ok(None),
        }
    }

    fn range(
        &self,
        address: &str,
        first: Timestamp,
        last: Timestamp,
    ) -> Result<Vec<(Timestamp, ChallengeRecord)>, StoreError> {
        if first > last {
            return Ok(Vec::new());
        }
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let Some(db) = self.open_namespace(&rtxn, address)? else {
            return Ok(Vec::new());
        };

        let lo = first.to_key();
        let hi = last.to_key();
        let bounds = (Bound::Included(&lo[..]), Bound::Included(&hi[..]));
        let mut records = Vec::new();
        for result in db.range(&rtxn, &bounds).map_err(LmdbError::from)? {
            let (key, val) = result.map_err(LmdbError::from)?;
            let ts = Timestamp::from_key(key).map_err(LmdbError::from)?;
            let record: ChallengeRecord = bincode::deserialize(val).map_err(LmdbError::from)?;
            records.push((ts, record));
        }
        Ok(records)
    }

    fn delete_range(&self, address: &str, range: DeleteRange) -> Result<usize, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let Some(db) = self.open_namespace(&wtxn, address)? else {
            return Ok(0);
        };

        let removed = match range {
            DeleteRange::Before(cutoff) => {
                let key = cutoff.to_key();
                let bounds: (Bound<&[u8]>, Bound<&[u8]>) =
                    (Bound::Unbounded, Bound::Excluded(&key[..]));
                db.delete_range(&mut wtxn, &bounds).map_err(LmdbError::from)?
            }
            DeleteRange::After(cutoff) => {
                let key = cutoff.to_key();
                let bounds: (Bound<&[u8]>, Bound<&[u8]>) =
                    (Bound::Included(&key[..]), Bound::Unbounded);
                db.delete_range(&mut wtxn, &bounds).map_err(LmdbError::from)?
            }
        };
        wtxn.commit().map_err(LmdbError::from)?;
        tracing::debug!(address, ?range, removed, "deleted challenge range");
        Ok(removed)
    }

    fn delete_all(&self, address: &str) -> Result<usize, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let Some(db) = self.open_namespace(&wtxn, address)? else {
            return Ok(0);
        };
        let removed = db.len(&wtxn).map_err(LmdbError::from)?;
        db.clear(&mut wtxn).map_err(LmdbError::from)?;
        self.index_db
            .delete(&mut wtxn, address.as_bytes())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(removed as usize)
    }

    fn summaries(&self) -> Result<Vec<ChallengeSummary>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut summaries = Vec::new();
        for result in self.index_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (key, _) = result.map_err(LmdbError::from)?;
            let address = std::str::from_utf8(key)
                .map_err(|e| LmdbError::Serialization(e.to_string()))?
                .to_string();
            let Some(db) = self.open_namespace(&rtxn, &address)? else {
                return Err(StoreError::Corruption(format!(
                    "indexed challenge namespace for {address} is missing"
                )));
            };
            let span = span_of(&db, &rtxn)?;
            summaries.push(ChallengeSummary {
                count: db.len(&rtxn).map_err(LmdbError::from)?,
                first: span.map(|s| s.first),
                last: span.map(|s| s.last),
                address,
            });
        }
        Ok(summaries)
    }
}

/// A write transaction over one hotspot namespace.
///
/// Dropping the batch without [`ChallengeBatch::commit`] aborts the LMDB
/// transaction and rolls back every put.
pub struct LmdbChallengeBatch<'a> {
    txn: RwTxn<'a>,
    db: ChallengeDb,
    index_db: Database<Bytes, Bytes>,
    address: String,
    written: usize,
}

impl ChallengeBatch for LmdbChallengeBatch<'_> {
    fn span(&self) -> Result<Option<CacheSpan>, StoreError> {
        Ok(span_of(&self.db, &self.txn)?)
    }

    fn put(&mut self, ts: Timestamp, record: &ChallengeRecord) -> Result<(), StoreError> {
        let bytes = bincode::serialize(record).map_err(LmdbError::from)?;
        self.db
            .put(&mut self.txn, &ts.to_key(), &bytes)
            .map_err(LmdbError::from)?;
        if self.written == 0 {
            self.index_db
                .put(&mut self.txn, self.address.as_bytes(), &[])
                .map_err(LmdbError::from)?;
        }
        self.written += 1;
        Ok(())
    }

    fn commit(self) -> Result<usize, StoreError> {
        self.txn.commit().map_err(LmdbError::from)?;
        Ok(self.written)
    }
}
