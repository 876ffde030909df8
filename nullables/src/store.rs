//! Nullable stores: thread-safe in-memory storage for testing.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use hotspot_store::challenge::{
    CacheSpan, ChallengeBatch, ChallengeStore, ChallengeSummary, DeleteRange,
};
use hotspot_store::hotspot::HotspotStore;
use hotspot_store::StoreError;
use hotspot_types::{normalize_name, ChallengeRecord, Hotspot, Timestamp};

type Namespace = BTreeMap<u64, ChallengeRecord>;

fn span_of(ns: &Namespace) -> Option<CacheSpan> {
    let first = *ns.keys().next()?;
    let last = *ns.keys().next_back()?;
    Some(CacheSpan {
        first: Timestamp::new(first),
        last: Timestamp::new(last),
    })
}

/// An in-memory challenge store for testing.
///
/// Batches work on a private copy of the namespace that replaces the stored
/// one on commit, so a dropped batch leaves nothing behind.
#[derive(Default)]
pub struct NullChallengeStore {
    namespaces: Mutex<BTreeMap<String, Namespace>>,
    committed_puts: AtomicUsize,
    fail_commits: AtomicBool,
}

impl NullChallengeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total records written by committed batches.
    pub fn committed_puts(&self) -> usize {
        self.committed_puts.load(Ordering::SeqCst)
    }

    /// Make every subsequent commit fail with a backend error.
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Stored keys for `address`, ascending.
    pub fn keys(&self, address: &str) -> Vec<u64> {
        self.namespaces
            .lock()
            .unwrap()
            .get(address)
            .map(|ns| ns.keys().copied().collect())
            .unwrap_or_default()
    }
}

pub struct NullChallengeBatch<'a> {
    store: &'a NullChallengeStore,
    address: String,
    working: Namespace,
    written: usize,
}

impl ChallengeBatch for NullChallengeBatch<'_> {
    fn span(&self) -> Result<Option<CacheSpan>, StoreError> {
        Ok(span_of(&self.working))
    }

    fn put(&mut self, ts: Timestamp, record: &ChallengeRecord) -> Result<(), StoreError> {
        self.working.insert(ts.as_secs(), record.clone());
        self.written += 1;
        Ok(())
    }

    fn commit(self) -> Result<usize, StoreError> {
        if self.store.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("null store commit failure".into()));
        }
        if self.written > 0 {
            self.store
                .namespaces
                .lock()
                .unwrap()
                .insert(self.address, self.working);
            self.store
                .committed_puts
                .fetch_add(self.written, Ordering::SeqCst);
        }
        Ok(self.written)
    }
}

impl ChallengeStore for NullChallengeStore {
    type Batch<'a> = NullChallengeBatch<'a>
    where
        Self: 'a;

    fn begin_batch(&self, address: &str) -> Result<Self::Batch<'_>, StoreError> {
        let working = self
            .namespaces
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or_default();
        Ok(NullChallengeBatch {
            store: self,
            address: address.to_string(),
            working,
            written: 0,
        })
    }

    fn span(&self, address: &str) -> Result<Option<CacheSpan>, StoreError> {
        Ok(self.namespaces.lock().unwrap().get(address).and_then(span_of))
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
        let namespaces = self.namespaces.lock().unwrap();
        Ok(namespaces
            .get(address)
            .map(|ns| {
                ns.range(first.as_secs()..=last.as_secs())
                    .map(|(k, v)| (Timestamp::new(*k), v.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn delete_range(&self, address: &str, range: DeleteRange) -> Result<usize, StoreError> {
        let mut namespaces = self.namespaces.lock().unwrap();
        let Some(ns) = namespaces.get_mut(address) else {
            return Ok(0);
        };
        let before = ns.len();
        match range {
            DeleteRange::Before(cutoff) => ns.retain(|k, _| *k >= cutoff.as_secs()),
            DeleteRange::After(cutoff) => ns.retain(|k, _| *k < cutoff.as_secs()),
        }
        Ok(before - ns.len())
    }

    fn delete_all(&self, address: &str) -> Result<usize, StoreError> {
        Ok(self
            .namespaces
            .lock()
            .unwrap()
            .remove(address)
            .map(|ns| ns.len())
            .unwrap_or(0))
    }

    fn summaries(&self) -> Result<Vec<ChallengeSummary>, StoreError> {
        Ok(self
            .namespaces
            .lock()
            .unwrap()
            .iter()
            .map(|(address, ns)| {
                let span = span_of(ns);
                ChallengeSummary {
                    address: address.clone(),
                    count: ns.len() as u64,
                    first: span.map(|s| s.first),
                    last: span.map(|s| s.last),
                }
            })
            .collect())
    }
}

/// An in-memory hotspot directory store for testing.
#[derive(Default)]
pub struct NullHotspotStore {
    hotspots: Mutex<BTreeMap<String, Hotspot>>,
    names: Mutex<BTreeMap<String, String>>,
    height: Mutex<Option<u64>>,
    reads: AtomicUsize,
}

impl NullHotspotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of point lookups served, for memoisation assertions.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl HotspotStore for NullHotspotStore {
    fn get_hotspot(&self, address: &str) -> Result<Option<Hotspot>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.hotspots.lock().unwrap().get(address).cloned())
    }

    fn address_for_name(&self, name: &str) -> Result<Option<String>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .names
            .lock()
            .unwrap()
            .get(&normalize_name(name))
            .cloned())
    }

    fn replace_all(&self, hotspots: &[Hotspot], height: Option<u64>) -> Result<usize, StoreError> {
        let mut names = self.names.lock().unwrap();
        let mut staged: HashMap<String, String> = HashMap::new();
        for hotspot in hotspots {
            let name = normalize_name(&hotspot.name);
            if name.is_empty() {
                continue;
            }
            let existing = staged.get(&name).or_else(|| names.get(&name));
            match existing {
                Some(existing) if *existing != hotspot.address => {
                    return Err(StoreError::NameCollision {
                        name,
                        existing: existing.clone(),
                        attempted: hotspot.address.clone(),
                    });
                }
                _ => {
                    staged.insert(name, hotspot.address.clone());
                }
            }
        }

        names.extend(staged);
        let mut stored = self.hotspots.lock().unwrap();
        for hotspot in hotspots {
            stored.insert(hotspot.address.clone(), hotspot.clone());
        }
        if height.is_some() {
            *self.height.lock().unwrap() = height;
        }
        Ok(hotspots.len())
    }

    fn iter_hotspots(&self) -> Result<Vec<Hotspot>, StoreError> {
        Ok(self.hotspots.lock().unwrap().values().cloned().collect())
    }

    fn iter_names(&self) -> Result<Vec<(String, String)>, StoreError> {
        Ok(self
            .names
            .lock()
            .unwrap()
            .iter()
            .map(|(n, a)| (n.clone(), a.clone()))
            .collect())
    }

    fn directory_height(&self) -> Result<Option<u64>, StoreError> {
        Ok(*self.height.lock().unwrap())
    }
}
