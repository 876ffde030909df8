//! The reconciling cache itself.

use std::sync::Arc;
use std::time::Duration;

use hotspot_client::{ChallengeSource, Fetcher};
use hotspot_store::{CacheSpan, ChallengeBatch, ChallengeStore, ChallengeSummary, DeleteRange};
use hotspot_types::{ChallengeRecord, Timestamp};
use hotspot_utils::Clock;

use crate::plan::{plan, ReconcilePlan};
use crate::CacheError;

/// What a reconciliation did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub plan: ReconcilePlan,
    /// Records returned by the remote source.
    pub fetched: usize,
    /// Records newly written to the cache.
    pub written: usize,
}

/// Records served for a window, and whether the cache was brought up to date
/// first or served as-is after a failed refresh.
#[derive(Clone, Debug, PartialEq)]
pub struct Window {
    pub records: Vec<ChallengeRecord>,
    pub refreshed: bool,
}

/// Persistent per-hotspot challenge cache, reconciled against a remote source.
pub struct TimeRangeCache<S, C> {
    store: S,
    fetcher: Fetcher<C>,
    clock: Arc<dyn Clock>,
}

impl<S: ChallengeStore, C: ChallengeSource> TimeRangeCache<S, C> {
    pub fn new(store: S, fetcher: Fetcher<C>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            fetcher,
            clock,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn fetcher(&self) -> &Fetcher<C> {
        &self.fetcher
    }

    /// Bring the cache for `address` up to the window `[first, last]`.
    ///
    /// The whole reconciliation runs inside one store batch: the span is read,
    /// the remote history fetched and the new records written before a single
    /// commit. Only records strictly outside the pre-existing span are written.
    /// Any failure drops the batch, leaving the cache as it was.
    pub fn reconcile(
        &self,
        address: &str,
        first: Timestamp,
        last: Timestamp,
        holddown: Duration,
    ) -> Result<ReconcileOutcome, CacheError> {
        if first > last {
            return Err(CacheError::InvalidWindow { first, last });
        }

        let mut batch = self.store.begin_batch(address)?;
        let span = batch.span()?;
        let now = self.clock.now();
        let decision = plan(span, first, last, holddown, now);

        let ReconcilePlan::Fetch { not_before, reason } = decision else {
            tracing::debug!(address, %first, %last, "challenge cache is up to date");
            return Ok(ReconcileOutcome {
                plan: decision,
                fetched: 0,
                written: 0,
            });
        };

        tracing::info!(address, %reason, %not_before, "refreshing challenge cache");
        let records = self.fetcher.fetch_all(address, not_before)?;
        let fetched = records.len();

        let mut written = 0;
        for record in &records {
            let ts = match record.event_time() {
                Ok(ts) => ts,
                Err(e) => {
                    tracing::warn!(address, hash = %record.hash, error = %e, "skipping challenge");
                    continue;
                }
            };
            if is_new(span, ts) {
                batch.put(ts, record)?;
                written += 1;
            }
        }
        batch.commit()?;

        tracing::info!(address, fetched, written, "reconciled challenge cache");
        Ok(ReconcileOutcome {
            plan: decision,
            fetched,
            written,
        })
    }

    /// Reconcile, then query the window. A failed fetch is logged and the
    /// window is served from whatever is already cached.
    pub fn reconcile_or_stale(
        &self,
        address: &str,
        first: Timestamp,
        last: Timestamp,
        holddown: Duration,
    ) -> Result<Window, CacheError> {
        let refreshed = match self.reconcile(address, first, last, holddown) {
            Ok(_) => true,
            Err(CacheError::Fetch(e)) => {
                tracing::warn!(address, error = %e, "refresh failed, using cached challenges");
                false
            }
            Err(e) => return Err(e),
        };
        Ok(Window {
            records: self.query(address, first, last)?,
            refreshed,
        })
    }

    /// Cached records with `first <= event time <= last`, oldest first.
    pub fn query(
        &self,
        address: &str,
        first: Timestamp,
        last: Timestamp,
    ) -> Result<Vec<ChallengeRecord>, CacheError> {
        if first > last {
            return Err(CacheError::InvalidWindow { first, last });
        }
        let records = self.store.range(address, first, last)?;
        Ok(records.into_iter().map(|(_, record)| record).collect())
    }

    /// Earliest and latest cached event times.
    pub fn span(&self, address: &str) -> Result<Option<CacheSpan>, CacheError> {
        Ok(self.store.span(address)?)
    }

    pub fn delete_range(&self, address: &str, range: DeleteRange) -> Result<usize, CacheError> {
        let removed = self.store.delete_range(address, range)?;
        tracing::info!(address, ?range, removed, "deleted cached challenges");
        Ok(removed)
    }

    pub fn delete_all(&self, address: &str) -> Result<usize, CacheError> {
        let removed = self.store.delete_all(address)?;
        tracing::info!(address, removed, "deleted all cached challenges");
        Ok(removed)
    }

    /// Store records as given, keyed by event time. Identical keys replace.
    pub fn import(&self, address: &str, records: &[ChallengeRecord]) -> Result<usize, CacheError> {
        let mut batch = self.store.begin_batch(address)?;
        for record in records {
            match record.event_time() {
                Ok(ts) => batch.put(ts, record)?,
                Err(e) => {
                    tracing::warn!(address, hash = %record.hash, error = %e, "skipping challenge")
                }
            }
        }
        let written = batch.commit()?;
        tracing::info!(address, written, "imported challenges");
        Ok(written)
    }

    pub fn summaries(&self) -> Result<Vec<ChallengeSummary>, CacheError> {
        Ok(self.store.summaries()?)
    }
}

fn is_new(span: Option<CacheSpan>, ts: Timestamp) -> bool {
    span.map_or(true, |span| !span.contains(ts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::FetchReason;
    use hotspot_client::{Backoff, FetchError, FetchOptions, Retrier};
    use hotspot_nullables::fixtures::challenge;
    use hotspot_nullables::{NullChallengeSource, NullChallengeStore, NullClock, NullSleeper};

    const HOUR: Duration = Duration::from_secs(3600);

    struct Harness {
        clock: Arc<NullClock>,
        cache: TimeRangeCache<NullChallengeStore, NullChallengeSource>,
    }

    impl Harness {
        fn new(now: u64) -> Self {
            let clock = Arc::new(NullClock::new(now));
            let sleeper = Arc::new(NullSleeper::new());
            let retrier = Retrier::new(Backoff::new(2, Duration::from_millis(1)), sleeper.clone());
            let fetcher = Fetcher::new(
                NullChallengeSource::new(3),
                retrier,
                sleeper,
                FetchOptions::default(),
            );
            let cache = TimeRangeCache::new(NullChallengeStore::new(), fetcher, clock.clone());
            Self { clock, cache }
        }

        fn remote(&self) -> &NullChallengeSource {
            self.cache.fetcher().source()
        }

        fn remote_has(&self, times: impl IntoIterator<Item = u64>) {
            self.remote()
                .add_records("A", times.into_iter().map(|t| challenge("A", t)));
        }

        fn seed(&self, times: &[u64]) {
            let records: Vec<_> = times.iter().map(|&t| challenge("A", t)).collect();
            self.cache.import("A", &records).unwrap();
        }

        fn keys(&self) -> Vec<u64> {
            self.cache.store().keys("A")
        }
    }

    fn ts(secs: u64) -> Timestamp {
        Timestamp::new(secs)
    }

    #[test]
    fn query_returns_window_in_order() {
        let h = Harness::new(1000);
        h.seed(&[300, 100, 200]);
        let got = h.cache.query("A", ts(150), ts(300)).unwrap();
        assert_eq!(got.iter().map(|r| r.time).collect::<Vec<_>>(), vec![200, 300]);
    }

    #[test]
    fn empty_cache_fetches_everything_in_reach() {
        let h = Harness::new(100_000);
        h.remote_has((0..=10).map(|i| 60_000 + i * 4_000));

        let outcome = h.cache.reconcile("A", ts(70_000), ts(100_000), HOUR).unwrap();
        assert_eq!(
            outcome.plan,
            ReconcilePlan::Fetch {
                not_before: ts(66_400),
                reason: FetchReason::Empty
            }
        );
        assert_eq!(h.keys(), vec![68_000, 72_000, 76_000, 80_000, 84_000, 88_000, 92_000, 96_000, 100_000]);
        assert_eq!(outcome.written, 9);
    }

    #[test]
    fn second_reconcile_writes_nothing() {
        let h = Harness::new(100_000);
        h.remote_has((0..=10).map(|i| 60_000 + i * 4_000));

        h.cache.reconcile("A", ts(70_000), ts(100_000), HOUR).unwrap();
        let puts = h.cache.store().committed_puts();
        let again = h.cache.reconcile("A", ts(70_000), ts(100_000), HOUR).unwrap();

        assert_eq!(again.plan, ReconcilePlan::UpToDate);
        assert_eq!(again.written, 0);
        assert_eq!(h.cache.store().committed_puts(), puts);
    }

    #[test]
    fn gap_fill_covers_both_ends_without_rewriting_middle() {
        let h = Harness::new(50_000);
        // Remote history from 0 to 50_000 every 1_000s.
        h.remote_has((0..=50).map(|i| i * 1_000));
        // Cache already holds [20_000, 30_000].
        h.seed(&[20_000, 25_000, 30_000]);
        let before = h.cache.store().committed_puts();

        let outcome = h.cache.reconcile("A", ts(10_000), ts(50_000), HOUR).unwrap();
        assert_eq!(
            outcome.plan,
            ReconcilePlan::Fetch {
                not_before: ts(6_400),
                reason: FetchReason::ReachBack
            }
        );

        let keys = h.keys();
        assert_eq!(keys.first(), Some(&7_000));
        assert_eq!(keys.last(), Some(&50_000));
        // Every remote second outside [20_000, 30_000] plus the three seeded.
        let outside = (7..=50).filter(|i| !(20..=30).contains(i)).count();
        assert_eq!(outcome.written, outside);
        assert_eq!(h.cache.store().committed_puts() - before, outside);
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        // Inside the old span only the seeded records remain.
        assert_eq!(
            keys.iter().filter(|k| (20_000..=30_000).contains(*k)).count(),
            3
        );
    }

    #[test]
    fn stale_tail_is_backfilled() {
        let h = Harness::new(200_000);
        h.remote_has((0..=20).map(|i| 100_000 + i * 5_000));
        h.seed(&[100_000, 150_000]);

        let outcome = h.cache.reconcile("A", ts(100_000), ts(200_000), HOUR).unwrap();
        assert_eq!(
            outcome.plan,
            ReconcilePlan::Fetch {
                not_before: ts(146_400),
                reason: FetchReason::StaleTail
            }
        );
        // 150_000 was already cached and is not rewritten.
        assert_eq!(outcome.fetched, 11);
        assert_eq!(outcome.written, 10);
        assert_eq!(h.keys().last(), Some(&200_000));
    }

    #[test]
    fn fetch_failure_leaves_cache_untouched() {
        let h = Harness::new(200_000);
        h.remote_has([150_000, 190_000]);
        h.seed(&[100_000]);
        h.remote().set_offline(true);

        let err = h.cache.reconcile("A", ts(100_000), ts(200_000), HOUR).unwrap_err();
        assert!(matches!(err, CacheError::Fetch(FetchError::RetriesExhausted { .. })));
        assert_eq!(h.keys(), vec![100_000]);
    }

    #[test]
    fn commit_failure_leaves_cache_untouched() {
        let h = Harness::new(200_000);
        h.remote_has([150_000, 190_000]);
        h.seed(&[100_000]);
        h.cache.store().set_fail_commits(true);

        assert!(matches!(
            h.cache.reconcile("A", ts(100_000), ts(200_000), HOUR),
            Err(CacheError::Store(_))
        ));
        h.cache.store().set_fail_commits(false);
        assert_eq!(h.keys(), vec![100_000]);
    }

    #[test]
    fn stale_cache_is_served_when_remote_is_down() {
        let h = Harness::new(200_000);
        h.seed(&[100_000, 120_000, 140_000]);
        h.remote().set_offline(true);

        let window = h.cache.reconcile_or_stale("A", ts(110_000), ts(200_000), HOUR).unwrap();
        assert!(!window.refreshed);
        assert_eq!(window.records.iter().map(|r| r.time).collect::<Vec<_>>(), vec![120_000, 140_000]);
    }

    #[test]
    fn clock_drift_triggers_refresh() {
        let h = Harness::new(100_000);
        h.remote_has([99_000]);
        h.cache.reconcile("A", ts(96_000), ts(100_000), HOUR).unwrap();
        assert_eq!(h.keys(), vec![99_000]);

        h.clock.advance(10 * 3600);
        h.remote_has([130_000]);
        let outcome = h.cache.reconcile("A", ts(96_000), ts(136_000), HOUR).unwrap();
        assert_eq!(outcome.written, 1);
        assert_eq!(h.keys(), vec![99_000, 130_000]);
    }

    #[test]
    fn inverted_window_is_rejected() {
        let h = Harness::new(0);
        assert!(matches!(
            h.cache.reconcile("A", ts(10), ts(5), HOUR),
            Err(CacheError::InvalidWindow { .. })
        ));
        assert!(h.cache.query("A", ts(10), ts(5)).is_err());
    }

    #[test]
    fn import_skips_records_without_time() {
        let h = Harness::new(0);
        let mut broken = challenge("A", 5);
        broken.path = None;
        let written = h.cache.import("A", &[challenge("A", 1), broken]).unwrap();
        assert_eq!(written, 1);
        assert_eq!(h.keys(), vec![1]);
    }
}
