//! Reconciliation planning.
//!
//! Pure decision of whether a cached span covers a requested window, and if
//! not, how far back the remote history must be read.

use std::fmt;
use std::time::Duration;

use hotspot_store::CacheSpan;
use hotspot_types::Timestamp;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchReason {
    /// Nothing cached yet.
    Empty,
    /// The earliest cached record is too late for the window.
    ReachBack,
    /// The newest cached record is too old for the window.
    StaleTail,
}

impl fmt::Display for FetchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Empty => "empty",
            Self::ReachBack => "reach-back",
            Self::StaleTail => "stale-tail",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcilePlan {
    UpToDate,
    /// Fetch newest-first until records older than `not_before` appear.
    Fetch {
        not_before: Timestamp,
        reason: FetchReason,
    },
}

/// Decide how to bring `span` up to `[first, last]`.
///
/// The cache is current when its newest record is within `holddown` of `now`
/// and its oldest is within `holddown` after `first`. A stale tail is refetched
/// from `holddown` before the newest cached record; records already inside the
/// span are filtered out at write time.
pub fn plan(
    span: Option<CacheSpan>,
    first: Timestamp,
    last: Timestamp,
    holddown: Duration,
    now: Timestamp,
) -> ReconcilePlan {
    let Some(span) = span else {
        return ReconcilePlan::Fetch {
            not_before: first.saturating_sub(holddown),
            reason: FetchReason::Empty,
        };
    };

    let fresh = span.last.saturating_add(holddown) >= now;
    let reaches_back = span.first <= first.saturating_add(holddown);

    if fresh && reaches_back {
        ReconcilePlan::UpToDate
    } else if !reaches_back {
        ReconcilePlan::Fetch {
            not_before: first.saturating_sub(holddown),
            reason: FetchReason::ReachBack,
        }
    } else if span.last < last.saturating_sub(holddown) {
        ReconcilePlan::Fetch {
            not_before: span.last.saturating_sub(holddown),
            reason: FetchReason::StaleTail,
        }
    } else {
        ReconcilePlan::UpToDate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    fn ts(secs: u64) -> Timestamp {
        Timestamp::new(secs)
    }

    fn span(first: u64, last: u64) -> Option<CacheSpan> {
        Some(CacheSpan {
            first: ts(first),
            last: ts(last),
        })
    }

    #[test]
    fn empty_cache_fetches_past_window_start() {
        assert_eq!(
            plan(None, ts(100_000), ts(200_000), HOUR, ts(200_000)),
            ReconcilePlan::Fetch {
                not_before: ts(96_400),
                reason: FetchReason::Empty
            }
        );
    }

    #[test]
    fn fresh_and_deep_cache_is_up_to_date() {
        // Newest record 30 minutes old, oldest within the holddown of `first`.
        assert_eq!(
            plan(span(101_000, 198_200), ts(100_000), ts(200_000), HOUR, ts(200_000)),
            ReconcilePlan::UpToDate
        );
    }

    #[test]
    fn shallow_cache_reaches_back() {
        assert_eq!(
            plan(span(150_000, 199_000), ts(100_000), ts(200_000), HOUR, ts(200_000)),
            ReconcilePlan::Fetch {
                not_before: ts(96_400),
                reason: FetchReason::ReachBack
            }
        );
    }

    #[test]
    fn reach_back_wins_over_stale_tail() {
        assert_eq!(
            plan(span(150_000, 160_000), ts(100_000), ts(200_000), HOUR, ts(200_000)),
            ReconcilePlan::Fetch {
                not_before: ts(96_400),
                reason: FetchReason::ReachBack
            }
        );
    }

    #[test]
    fn stale_tail_refetches_from_before_newest_record() {
        assert_eq!(
            plan(span(100_000, 150_000), ts(100_000), ts(200_000), HOUR, ts(200_000)),
            ReconcilePlan::Fetch {
                not_before: ts(146_400),
                reason: FetchReason::StaleTail
            }
        );
    }

    #[test]
    fn old_window_with_stale_clock_is_up_to_date() {
        // The window ended long ago; the cache covers it even though "now" moved on.
        assert_eq!(
            plan(span(100_000, 199_000), ts(100_000), ts(200_000), HOUR, ts(900_000)),
            ReconcilePlan::UpToDate
        );
    }

    #[test]
    fn holddown_saturates_at_epoch() {
        assert_eq!(
            plan(None, ts(10), ts(20), HOUR, ts(20)),
            ReconcilePlan::Fetch {
                not_before: Timestamp::EPOCH,
                reason: FetchReason::Empty
            }
        );
    }
}
