//! Nullable remote source. Serves pages from in-memory data instead of the network.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use hotspot_client::{ChallengeSource, DirectorySource, FetchError, Page};
use hotspot_types::{ChallengeRecord, Hotspot};

/// Offset of the next page, encoded as the cursor string.
fn page_slice<T: Clone>(items: &[T], cursor: Option<&str>, page_size: usize) -> Page<T> {
    let start = cursor
        .and_then(|c| c.parse::<usize>().ok())
        .unwrap_or(0)
        .min(items.len());
    let end = (start + page_size).min(items.len());
    let next = (end < items.len()).then(|| end.to_string());
    Page::new(items[start..end].to_vec(), next.as_deref())
}

/// A remote challenge API backed by per-address record lists.
///
/// Records are served newest first in pages of `page_size`. Failures can be
/// queued ahead of any request, or the whole source taken offline.
pub struct NullChallengeSource {
    records: Mutex<HashMap<String, Vec<ChallengeRecord>>>,
    page_size: usize,
    failures: Mutex<VecDeque<FetchError>>,
    offline: AtomicBool,
    requests: Mutex<Vec<(String, Option<String>)>>,
}

impl NullChallengeSource {
    pub fn new(page_size: usize) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            page_size: page_size.max(1),
            failures: Mutex::new(VecDeque::new()),
            offline: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Add records for `address`; the served list is kept newest first.
    pub fn add_records(&self, address: &str, records: impl IntoIterator<Item = ChallengeRecord>) {
        let mut all = self.records.lock().unwrap();
        let list = all.entry(address.to_string()).or_default();
        list.extend(records);
        list.sort_by_key(|r| std::cmp::Reverse(r.event_time_nanos().unwrap_or(0)));
    }

    /// Fail the next request with `err`.
    pub fn fail_next(&self, err: FetchError) {
        self.failures.lock().unwrap().push_back(err);
    }

    /// While offline every request fails with a transport error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Every `(address, cursor)` requested so far.
    pub fn requests(&self) -> Vec<(String, Option<String>)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().unwrap().clear();
    }
}

impl Default for NullChallengeSource {
    fn default() -> Self {
        Self::new(100)
    }
}

impl ChallengeSource for NullChallengeSource {
    fn fetch_page(
        &self,
        address: &str,
        cursor: Option<&str>,
    ) -> Result<Page<ChallengeRecord>, FetchError> {
        self.requests
            .lock()
            .unwrap()
            .push((address.to_string(), cursor.map(str::to_string)));
        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Transport("null source is offline".into()));
        }
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        let all = self.records.lock().unwrap();
        let list = all.get(address).map(Vec::as_slice).unwrap_or_default();
        Ok(page_slice(list, cursor, self.page_size))
    }
}

/// A remote hotspot directory backed by a fixed list.
pub struct NullDirectorySource {
    hotspots: Mutex<Vec<Hotspot>>,
    page_size: usize,
    height: AtomicU64,
    pages_served: AtomicU64,
}

impl NullDirectorySource {
    pub fn new(hotspots: Vec<Hotspot>, height: u64, page_size: usize) -> Self {
        Self {
            hotspots: Mutex::new(hotspots),
            page_size: page_size.max(1),
            height: AtomicU64::new(height),
            pages_served: AtomicU64::new(0),
        }
    }

    pub fn set_height(&self, height: u64) {
        self.height.store(height, Ordering::SeqCst);
    }

    pub fn set_hotspots(&self, hotspots: Vec<Hotspot>) {
        *self.hotspots.lock().unwrap() = hotspots;
    }

    /// Number of listing pages served so far.
    pub fn pages_served(&self) -> u64 {
        self.pages_served.load(Ordering::SeqCst)
    }
}

impl DirectorySource for NullDirectorySource {
    fn fetch_hotspot_page(&self, cursor: Option<&str>) -> Result<Page<Hotspot>, FetchError> {
        self.pages_served.fetch_add(1, Ordering::SeqCst);
        let hotspots = self.hotspots.lock().unwrap();
        Ok(page_slice(&hotspots, cursor, self.page_size))
    }

    fn fetch_hotspot(&self, address: &str) -> Result<Option<Hotspot>, FetchError> {
        let hotspots = self.hotspots.lock().unwrap();
        Ok(hotspots.iter().find(|h| h.address == address).cloned())
    }

    fn current_height(&self) -> Result<u64, FetchError> {
        Ok(self.height.load(Ordering::SeqCst))
    }
}
