//! Cursor-following fetch loops.

use std::sync::Arc;
use std::time::Duration;

use hotspot_types::{ChallengeRecord, Hotspot, Timestamp};

use crate::retry::{Retrier, Sleeper};
use crate::source::{ChallengeSource, DirectorySource};
use crate::FetchError;

/// Courtesy delay between challenge pages.
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(750);

/// Courtesy delay between directory pages.
pub const DEFAULT_DIRECTORY_PAGE_DELAY: Duration = Duration::from_millis(250);

const PROGRESS_EVERY: usize = 100;
const DIRECTORY_PROGRESS_EVERY: usize = 1000;

#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub page_delay: Duration,
    pub directory_page_delay: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            page_delay: DEFAULT_PAGE_DELAY,
            directory_page_delay: DEFAULT_DIRECTORY_PAGE_DELAY,
        }
    }
}

/// Drives a page source through its cursors. Each request is retried on its
/// own budget; a request that exhausts its retries fails the whole fetch.
pub struct Fetcher<S> {
    source: S,
    retrier: Retrier,
    sleeper: Arc<dyn Sleeper>,
    options: FetchOptions,
}

impl<S> Fetcher<S> {
    pub fn new(source: S, retrier: Retrier, sleeper: Arc<dyn Sleeper>, options: FetchOptions) -> Self {
        Self {
            source,
            retrier,
            sleeper,
            options,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

impl<S: ChallengeSource> Fetcher<S> {
    /// Fetch every challenge for `address` whose event time is at or after
    /// `not_before`, newest first.
    ///
    /// The source returns pages newest first, but ordering at page boundaries
    /// is not guaranteed, so each page is scanned in full: records older than
    /// `not_before` are dropped and paging stops after the first page that
    /// contained one. Records without a derivable event time are skipped.
    /// A walk that ends without the remote returning any record at all is
    /// [`FetchError::NoRecords`].
    pub fn fetch_all(
        &self,
        address: &str,
        not_before: Timestamp,
    ) -> Result<Vec<ChallengeRecord>, FetchError> {
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;
        // Records the remote returned at all, cut off or not.
        let mut seen = 0usize;

        loop {
            let page = self
                .retrier
                .run("challenges", || self.source.fetch_page(address, cursor.as_deref()))?;
            let next = page.next_cursor().map(str::to_string);

            if page.data.is_empty() && next.is_none() {
                if seen == 0 {
                    return Err(FetchError::NoRecords(address.to_string()));
                }
                break;
            }
            seen += page.data.len();

            let mut reached_cutoff = false;
            for record in page.data {
                let event_time = match record.event_time() {
                    Ok(ts) => ts,
                    Err(e) => {
                        tracing::warn!(address, hash = %record.hash, error = %e, "skipping challenge");
                        continue;
                    }
                };
                if event_time < not_before {
                    reached_cutoff = true;
                    continue;
                }
                records.push(record);
                if records.len() % PROGRESS_EVERY == 0 {
                    tracing::info!(address, fetched = records.len(), last = %event_time, "fetching challenges");
                }
            }

            if reached_cutoff {
                break;
            }
            match next {
                None => {
                    tracing::debug!(address, "no cursor in response, last page");
                    break;
                }
                Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                    tracing::warn!(address, cursor = %next, "server repeated the previous cursor, stopping");
                    break;
                }
                Some(next) => cursor = Some(next),
            }
            self.sleeper.sleep(self.options.page_delay);
        }

        tracing::info!(address, count = records.len(), since = %not_before, "fetched challenges");
        Ok(records)
    }
}

impl<S: DirectorySource> Fetcher<S> {
    /// Download the full hotspot directory.
    pub fn fetch_hotspots(&self) -> Result<Vec<Hotspot>, FetchError> {
        let mut hotspots: Vec<Hotspot> = Vec::new();
        let mut cursor: Option<String> = None;
        let mut last_logged = 0;

        loop {
            let page = self
                .retrier
                .run("hotspots", || self.source.fetch_hotspot_page(cursor.as_deref()))?;
            let next = page.next_cursor().map(str::to_string);
            hotspots.extend(page.data);

            if hotspots.len() - last_logged >= DIRECTORY_PROGRESS_EVERY {
                tracing::info!(loaded = hotspots.len(), "fetching hotspots");
                last_logged = hotspots.len();
            }

            match next {
                None => break,
                Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                    tracing::warn!(cursor = %next, "server repeated the previous cursor, stopping");
                    break;
                }
                Some(next) => cursor = Some(next),
            }
            self.sleeper.sleep(self.options.directory_page_delay);
        }

        tracing::info!(count = hotspots.len(), "fetched hotspot directory");
        Ok(hotspots)
    }

    pub fn fetch_hotspot(&self, address: &str) -> Result<Option<Hotspot>, FetchError> {
        self.retrier.run("hotspot", || self.source.fetch_hotspot(address))
    }

    pub fn current_height(&self) -> Result<u64, FetchError> {
        self.retrier.run("height", || self.source.current_height())
    }
}
