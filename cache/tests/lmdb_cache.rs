//! Reconciliation against the real LMDB backend.

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;

use hotspot_cache::{ReconcilePlan, TimeRangeCache};
use hotspot_client::{Backoff, FetchOptions, Fetcher, Retrier};
use hotspot_nullables::fixtures::challenge;
use hotspot_nullables::{NullChallengeSource, NullClock, NullSleeper};
use hotspot_store::{ChallengeStore, DeleteRange};
use hotspot_store_lmdb::{LmdbChallengeStore, LmdbEnvironment};
use hotspot_types::Timestamp;

const HOUR: Duration = Duration::from_secs(3600);

fn temp_env() -> (tempfile::TempDir, LmdbEnvironment) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let env =
        LmdbEnvironment::open(dir.path(), 64, 10 * 1024 * 1024).expect("failed to open env");
    (dir, env)
}

fn cache(
    env: &LmdbEnvironment,
    now: u64,
) -> TimeRangeCache<LmdbChallengeStore, NullChallengeSource> {
    let sleeper = Arc::new(NullSleeper::new());
    let fetcher = Fetcher::new(
        NullChallengeSource::new(4),
        Retrier::new(Backoff::new(1, Duration::ZERO), sleeper.clone()),
        sleeper,
        FetchOptions::default(),
    );
    TimeRangeCache::new(env.challenge_store(), fetcher, Arc::new(NullClock::new(now)))
}

fn ts(secs: u64) -> Timestamp {
    Timestamp::new(secs)
}

#[test]
fn seeded_records_query_in_order() {
    let (_dir, env) = temp_env();
    let cache = cache(&env, 1_000);
    cache
        .import("A", &[challenge("A", 100), challenge("A", 200), challenge("A", 300)])
        .unwrap();

    let got = cache.query("A", ts(150), ts(300)).unwrap();
    assert_eq!(got.len(), 2);
    assert_eq!(got[0].time, 200);
    assert_eq!(got[1].time, 300);
}

#[test]
fn reconcile_is_idempotent_on_disk() {
    let (_dir, env) = temp_env();
    let cache = cache(&env, 100_000);
    cache
        .fetcher()
        .source()
        .add_records("A", (0..=25).map(|i| challenge("A", 50_000 + i * 2_000)));

    let first = cache.reconcile("A", ts(60_000), ts(100_000), HOUR).unwrap();
    // Everything from 58_000 up; 56_000 predates the holddown.
    assert_eq!(first.written, 22);
    let store = env.challenge_store();
    let cached = store.range("A", Timestamp::EPOCH, Timestamp::MAX).unwrap();
    assert_eq!(cached.len(), 22);

    let second = cache.reconcile("A", ts(60_000), ts(100_000), HOUR).unwrap();
    assert_eq!(second.plan, ReconcilePlan::UpToDate);
    assert_eq!(second.written, 0);
    let cached = store.range("A", Timestamp::EPOCH, Timestamp::MAX).unwrap();
    assert_eq!(cached.len(), 22);
}

#[test]
fn deletes_trim_either_end() {
    let (_dir, env) = temp_env();
    let cache = cache(&env, 1_000);
    let records: Vec<_> = (1..=9).map(|i| challenge("A", i * 100)).collect();
    cache.import("A", &records).unwrap();

    assert_eq!(cache.delete_range("A", DeleteRange::Before(ts(300))).unwrap(), 2);
    assert_eq!(cache.delete_range("A", DeleteRange::After(ts(800))).unwrap(), 2);
    let span = cache.span("A").unwrap().unwrap();
    assert_eq!((span.first, span.last), (ts(300), ts(700)));

    assert_eq!(cache.delete_all("A").unwrap(), 5);
    assert!(cache.span("A").unwrap().is_none());
    assert!(cache.summaries().unwrap().is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// A range query returns exactly the stored keys inside the window, ascending.
    #[test]
    fn range_query_matches_filter(
        times in prop::collection::btree_set(0u64..10_000, 0..40),
        a in 0u64..10_000,
        b in 0u64..10_000,
    ) {
        let (first, last) = if a <= b { (a, b) } else { (b, a) };
        let (_dir, env) = temp_env();
        let cache = cache(&env, 20_000);
        let records: Vec<_> = times.iter().map(|&t| challenge("A", t)).collect();
        cache.import("A", &records).unwrap();

        let got: Vec<u64> = cache
            .query("A", ts(first), ts(last))
            .unwrap()
            .iter()
            .map(|r| r.time)
            .collect();
        let expected: Vec<u64> = times.range(first..=last).copied().collect();
        prop_assert_eq!(got, expected);
    }
}
