//! Command implementations over an opened database and a pair of remote
//! sources.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use hotspot_analysis::{beacon_validity, WitnessEngine};
use hotspot_cache::{ReconcileOutcome, TimeRangeCache};
use hotspot_client::{ChallengeSource, DirectorySource, Fetcher, Retrier, Sleeper};
use hotspot_directory::{looks_like_name, DirectoryError, HotspotDirectory};
use hotspot_store::DeleteRange;
use hotspot_store_lmdb::{LmdbChallengeStore, LmdbEnvironment, LmdbHotspotStore};
use hotspot_types::{ChallengeRecord, Hotspot, Timestamp};
use hotspot_utils::Clock;

use crate::config::AnalysisConfig;
use crate::output::{write_json, Output};

/// File format of `challenges export` / `challenges import`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChallengeExport {
    pub address: String,
    /// Seconds since epoch.
    pub exported_at: u64,
    pub challenges: Vec<ChallengeRecord>,
}

/// One row of `challenges list`.
#[derive(Debug)]
pub struct CachedHotspot {
    pub address: String,
    pub name: Option<String>,
    pub count: u64,
    pub first: Option<Timestamp>,
    pub last: Option<Timestamp>,
}

#[derive(Debug)]
pub struct AnalysisSummary {
    pub address: String,
    pub records: usize,
    pub refreshed: bool,
    pub peers: usize,
    pub beacons: usize,
    pub distances: usize,
    pub directory: PathBuf,
}

pub struct App<C, D> {
    config: AnalysisConfig,
    cache: TimeRangeCache<LmdbChallengeStore, C>,
    directory: HotspotDirectory<LmdbHotspotStore>,
    directory_fetcher: Fetcher<D>,
    clock: Arc<dyn Clock>,
}

impl<C: ChallengeSource, D: DirectorySource> App<C, D> {
    pub fn new(
        config: AnalysisConfig,
        env: &LmdbEnvironment,
        challenges: C,
        directory: D,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        let retrier = Retrier::new(config.backoff(), sleeper.clone());
        let challenge_fetcher =
            Fetcher::new(challenges, retrier.clone(), sleeper.clone(), config.fetch_options());
        let directory_fetcher = Fetcher::new(directory, retrier, sleeper, config.fetch_options());
        Self {
            cache: TimeRangeCache::new(env.challenge_store(), challenge_fetcher, clock.clone()),
            directory: HotspotDirectory::new(env.hotspot_store()),
            directory_fetcher,
            clock,
            config,
        }
    }

    pub fn cache(&self) -> &TimeRangeCache<LmdbChallengeStore, C> {
        &self.cache
    }

    fn window(&self, days: u64) -> (Timestamp, Timestamp) {
        let last = self.clock.now();
        let first = last.saturating_sub(Duration::from_secs(days.saturating_mul(86_400)));
        (first, last)
    }

    /// Resolve a name or address. Addresses the local directory does not know
    /// are looked up remotely and stored.
    pub fn resolve(&mut self, identifier: &str) -> anyhow::Result<String> {
        match self.directory.resolve(identifier) {
            Ok(address) => Ok(address),
            Err(DirectoryError::UnknownHotspot(_)) if !looks_like_name(identifier) => {
                let hotspot = self
                    .directory
                    .get_or_fetch(identifier.trim(), &self.directory_fetcher)?;
                Ok(hotspot.address)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Refresh the stored directory when it lags the chain, or always with
    /// `force`. Returns the number of hotspots stored, `None` if current.
    pub fn refresh_directory(&mut self, force: bool) -> anyhow::Result<Option<usize>> {
        if force {
            return Ok(Some(self.directory.refresh(&self.directory_fetcher)?));
        }
        let current = self.directory_fetcher.current_height()?;
        if !self
            .directory
            .needs_refresh(current, self.config.directory_max_lag_blocks)?
        {
            tracing::debug!(current, "hotspot directory is current");
            return Ok(None);
        }
        Ok(Some(self.directory.refresh(&self.directory_fetcher)?))
    }

    /// Like [`Self::refresh_directory`], but a failure only logs; the stored
    /// directory is used as-is.
    fn refresh_directory_best_effort(&mut self) {
        if let Err(err) = self.refresh_directory(false) {
            tracing::warn!(error = %err, "unable to refresh hotspot directory, using stored copy");
        }
    }

    pub fn refresh_challenges(
        &mut self,
        hotspot: &str,
        days: u64,
        holddown: Duration,
    ) -> anyhow::Result<(String, ReconcileOutcome)> {
        self.refresh_directory_best_effort();
        let address = self.resolve(hotspot)?;
        let (first, last) = self.window(days);
        let outcome = self.cache.reconcile(&address, first, last, holddown)?;
        Ok((address, outcome))
    }

    pub fn export_challenges(&mut self, hotspot: &str) -> anyhow::Result<ChallengeExport> {
        let address = self.resolve(hotspot)?;
        let challenges = self.cache.query(&address, Timestamp::EPOCH, Timestamp::MAX)?;
        Ok(ChallengeExport {
            address,
            exported_at: self.clock.now().as_secs(),
            challenges,
        })
    }

    pub fn import_challenges(
        &mut self,
        hotspot: &str,
        export: &ChallengeExport,
    ) -> anyhow::Result<usize> {
        let address = self.resolve(hotspot)?;
        if export.address != address {
            bail!("export is for {}, not {address}", export.address);
        }
        Ok(self.cache.import(&address, &export.challenges)?)
    }

    pub fn delete_challenges(&mut self, hotspot: &str, range: DeleteRange) -> anyhow::Result<usize> {
        let address = self.resolve(hotspot)?;
        Ok(self.cache.delete_range(&address, range)?)
    }

    pub fn delete_all_challenges(&mut self, hotspot: &str) -> anyhow::Result<usize> {
        let address = self.resolve(hotspot)?;
        Ok(self.cache.delete_all(&address)?)
    }

    pub fn list_challenges(&mut self) -> anyhow::Result<Vec<CachedHotspot>> {
        let mut rows = Vec::new();
        for summary in self.cache.summaries()? {
            rows.push(CachedHotspot {
                name: self.directory.name_of(&summary.address)?,
                address: summary.address,
                count: summary.count,
                first: summary.first,
                last: summary.last,
            });
        }
        Ok(rows)
    }

    pub fn export_hotspots(&self) -> anyhow::Result<Vec<Hotspot>> {
        Ok(self.directory.all()?)
    }

    pub fn import_hotspots(&mut self, hotspots: &[Hotspot]) -> anyhow::Result<usize> {
        Ok(self.directory.import(hotspots)?)
    }

    pub fn export_names(&self) -> anyhow::Result<BTreeMap<String, String>> {
        Ok(self.directory.names()?.into_iter().collect())
    }

    /// Reconcile the window (serving the stale cache if the remote is
    /// unavailable) and write per-peer reports, beacon totals and witness
    /// distances under `out/<hotspot name>/`.
    pub fn analyze(
        &mut self,
        hotspot: &str,
        days: u64,
        holddown: Duration,
        min_samples: usize,
        out: &Path,
    ) -> anyhow::Result<AnalysisSummary> {
        self.refresh_directory_best_effort();
        let address = self.resolve(hotspot)?;
        let (first, last) = self.window(days);
        let window = self.cache.reconcile_or_stale(&address, first, last, holddown)?;
        if !window.refreshed {
            tracing::warn!(address = %address, "analysing stale challenge cache");
        }

        // Newest first, the order the series are merged in.
        let mut records = window.records;
        records.reverse();
        if records.len() < min_samples {
            bail!("only {} challenges available for {address}", records.len());
        }

        let observer = self.directory.get(&address)?;
        let Some(name) = file_stem(&observer.name, &address) else {
            bail!("{address} has no name usable as a directory");
        };
        let dir = out.join(name);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("unable to create {}", dir.display()))?;

        let mut engine = WitnessEngine::new(&mut self.directory);
        let reports = engine.peer_reports(&address, &records, min_samples)?;
        for report in &reports {
            let Some(stem) = file_stem(&report.peer_name, &report.peer) else {
                tracing::warn!(peer = %report.peer, "no usable file name, skipping peer report");
                continue;
            };
            write_json(&Output::File(dir.join(format!("{stem}.json"))), report)?;
            tracing::info!(peer = %stem, points = report.data_points(), "wrote peer report");
        }

        let beacons = beacon_validity(&address, &records);
        write_json(&Output::File(dir.join("beacon-totals.json")), &beacons)?;

        let distances = engine.witness_distances(&address, &records)?;
        write_json(&Output::File(dir.join("witness-distances.json")), &distances)?;

        Ok(AnalysisSummary {
            address,
            records: records.len(),
            refreshed: window.refreshed,
            peers: reports.len(),
            beacons: beacons.len(),
            distances: distances.len(),
            directory: dir,
        })
    }
}

/// `name` if it is safe as a single path component, else `address` if that
/// is. Names come from the remote API and are never trusted as paths.
fn file_stem<'a>(name: &'a str, address: &'a str) -> Option<&'a str> {
    let safe = |s: &str| {
        !s.is_empty()
            && s != "."
            && !s.contains("..")
            && !s.contains(['/', '\\', '\0'])
    };
    [name, address].into_iter().find(|s| safe(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotspot_nullables::fixtures::{challenge_with_witnesses, witness};
    use hotspot_nullables::{NullChallengeSource, NullClock, NullDirectorySource, NullSleeper};
    use hotspot_store::ChallengeStore;

    const NOW: u64 = 1_000_000;
    const HOUR: Duration = Duration::from_secs(3600);

    type TestApp = App<NullChallengeSource, NullDirectorySource>;

    fn hotspot(address: &str, name: &str, lat: f64) -> Hotspot {
        Hotspot {
            address: address.into(),
            name: name.into(),
            lat: Some(lat),
            lng: Some(4.9),
            ..Default::default()
        }
    }

    fn app(env: &LmdbEnvironment) -> TestApp {
        let directory = NullDirectorySource::new(
            vec![
                hotspot("11me", "angry-purple-tiger", 52.37),
                hotspot("11near", "calm-blue-fox", 52.38),
                hotspot("11far", "wild-grey-wolf", 52.50),
            ],
            10_000,
            2,
        );
        let sleeper = Arc::new(NullSleeper::new());
        App::new(
            AnalysisConfig::default(),
            env,
            NullChallengeSource::new(5),
            directory,
            Arc::new(NullClock::new(NOW)),
            sleeper,
        )
    }

    fn seed_remote(app: &TestApp) {
        let records = (0..8u64).map(|i| {
            let t = NOW - 10_000 - i * 3_600;
            challenge_with_witnesses(
                "11me",
                t,
                vec![
                    witness("11near", t, -97, 6.0, true),
                    witness("11far", t, -119, -4.0, i < 2),
                ],
            )
        });
        app.cache().fetcher().source().add_records("11me", records);
    }

    fn open(dir: &Path) -> LmdbEnvironment {
        LmdbEnvironment::open(dir, 64, 16 * 1024 * 1024).unwrap()
    }

    #[test]
    fn analyze_writes_reports() {
        let db = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let env = open(db.path());
        let mut app = app(&env);
        seed_remote(&app);

        let summary = app
            .analyze("Angry Purple Tiger", 1, HOUR, 3, out.path())
            .unwrap();
        assert_eq!(summary.address, "11me");
        assert_eq!(summary.records, 8);
        assert!(summary.refreshed);
        // Only calm-blue-fox has three valid TX samples.
        assert_eq!(summary.peers, 1);
        assert_eq!(summary.beacons, 8);

        let dir = out.path().join("angry-purple-tiger");
        assert!(dir.join("calm-blue-fox.json").exists());
        assert!(!dir.join("wild-grey-wolf.json").exists());
        assert!(dir.join("beacon-totals.json").exists());
        assert!(dir.join("witness-distances.json").exists());
        let cached = env
            .challenge_store()
            .range("11me", Timestamp::EPOCH, Timestamp::MAX)
            .unwrap();
        assert_eq!(cached.len(), 8);
    }

    #[test]
    fn analyze_falls_back_to_stale_cache() {
        let db = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let env = open(db.path());
        let mut app = app(&env);
        seed_remote(&app);
        app.refresh_challenges("11me", 1, HOUR).unwrap();

        // Later, with the remote unreachable and the tail stale.
        app.cache().fetcher().source().set_offline(true);
        let mut later = App::new(
            AnalysisConfig {
                retry_attempts: 1,
                ..Default::default()
            },
            &env,
            NullChallengeSource::new(5),
            NullDirectorySource::new(Vec::new(), 10_000, 2),
            Arc::new(NullClock::new(NOW + 2 * 86_400)),
            Arc::new(NullSleeper::new()),
        );
        later.cache().fetcher().source().set_offline(true);
        let summary = later.analyze("11me", 3, HOUR, 3, out.path()).unwrap();
        assert!(!summary.refreshed);
        assert_eq!(summary.records, 8);
    }

    #[test]
    fn challenge_export_import_and_deletes() {
        let db = tempfile::tempdir().unwrap();
        let env = open(db.path());
        let mut app = app(&env);
        seed_remote(&app);
        // The remote has nothing for calm-blue-fox.
        assert!(app.refresh_challenges("calm blue fox", 1, HOUR).is_err());
        let (address, outcome) = app.refresh_challenges("11me", 1, HOUR).unwrap();
        assert_eq!(address, "11me");
        assert_eq!(outcome.written, 8);

        let export = app.export_challenges("angry-purple-tiger").unwrap();
        assert_eq!(export.challenges.len(), 8);
        assert!(app.import_challenges("11near", &export).is_err());

        assert_eq!(app.delete_all_challenges("11me").unwrap(), 8);
        assert_eq!(app.import_challenges("11me", &export).unwrap(), 8);

        let oldest = export.challenges[0].time;
        let removed = app
            .delete_challenges("11me", DeleteRange::Before(Timestamp::new(oldest + 1)))
            .unwrap();
        assert_eq!(removed, 1);

        let rows = app.list_challenges().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name.as_deref(), Some("angry-purple-tiger"));
        assert_eq!(rows[0].count, 7);
    }

    #[test]
    fn directory_refresh_export_and_import() {
        let db = tempfile::tempdir().unwrap();
        let env = open(db.path());
        let mut app = app(&env);

        assert_eq!(app.refresh_directory(false).unwrap(), Some(3));
        assert_eq!(app.refresh_directory(false).unwrap(), None);
        assert_eq!(app.refresh_directory(true).unwrap(), Some(3));

        let names = app.export_names().unwrap();
        assert_eq!(names.get("wild-grey-wolf").map(String::as_str), Some("11far"));

        let hotspots = app.export_hotspots().unwrap();
        assert_eq!(hotspots.len(), 3);

        let other_db = tempfile::tempdir().unwrap();
        let other_env = open(other_db.path());
        let mut other = App::new(
            AnalysisConfig::default(),
            &other_env,
            NullChallengeSource::new(5),
            NullDirectorySource::new(Vec::new(), 0, 2),
            Arc::new(NullClock::new(NOW)),
            Arc::new(NullSleeper::new()),
        );
        assert_eq!(other.import_hotspots(&hotspots).unwrap(), 3);
        assert_eq!(other.resolve("Wild Grey Wolf").unwrap(), "11far");
    }

    #[test]
    fn unsafe_names_fall_back_to_address() {
        assert_eq!(file_stem("calm-blue-fox", "11near"), Some("calm-blue-fox"));
        assert_eq!(file_stem("", "11near"), Some("11near"));
        assert_eq!(file_stem("../../etc/passwd", "11near"), Some("11near"));
        assert_eq!(file_stem("a\\b", "11near"), Some("11near"));
        assert_eq!(file_stem("..", ".."), None);
    }

    #[test]
    fn analyze_keeps_reports_inside_out_dir() {
        let db = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let env = open(db.path());
        let directory = NullDirectorySource::new(
            vec![
                hotspot("11me", "../escape", 52.37),
                hotspot("11near", "sub/dir", 52.38),
            ],
            10_000,
            2,
        );
        let mut app = App::new(
            AnalysisConfig::default(),
            &env,
            NullChallengeSource::new(5),
            directory,
            Arc::new(NullClock::new(NOW)),
            Arc::new(NullSleeper::new()),
        );
        seed_remote(&app);

        let summary = app.analyze("11me", 1, HOUR, 3, out.path()).unwrap();
        assert_eq!(summary.directory, out.path().join("11me"));
        assert_eq!(summary.peers, 1);
        assert!(summary.directory.join("11near.json").exists());
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 1);
    }

    #[test]
    fn unknown_address_is_fetched_remotely() {
        let db = tempfile::tempdir().unwrap();
        let env = open(db.path());
        let mut app = app(&env);
        assert_eq!(app.resolve("11near").unwrap(), "11near");
        assert!(app.resolve("11nobody").is_err());
        assert!(app.resolve("no-such-name").is_err());
    }
}
