//! Witness pairing: which observations connect two hotspots, and in which
//! direction the beacon travelled.

use std::collections::BTreeSet;

use hotspot_types::{
    BeaconCounts, ChallengeRecord, ChallengeResult, Direction, DistancePoint, Hotspot,
    WitnessObservation, WitnessResult,
};

use crate::geo::hotspot_distance;
use crate::report::PeerReport;
use crate::validity::min_rssi_for_snr;
use crate::{AnalysisError, HotspotLookup};

const NANOS_PER_SEC: u64 = 1_000_000_000;

fn poc_receipts(records: &[ChallengeRecord]) -> impl Iterator<Item = &ChallengeRecord> {
    records.iter().filter(|record| {
        if !record.is_poc_receipt() {
            tracing::warn!(kind = %record.kind, height = record.height, "unexpected record kind");
            return false;
        }
        true
    })
}

/// Block time in seconds: the top-level `time` when present, else the
/// derived event time.
fn record_secs(record: &ChallengeRecord) -> Option<u64> {
    if record.time > 0 {
        return Some(record.time);
    }
    record.event_time().ok().map(|t| t.as_secs())
}

/// Every hotspot that shares a segment-0 beacon with `address`, either as a
/// witness or as the challengee, sorted and excluding `address` itself.
pub fn unique_peers(address: &str, records: &[ChallengeRecord]) -> Vec<String> {
    let mut peers = BTreeSet::new();
    for record in poc_receipts(records) {
        let Some(segment) = record.first_segment() else {
            continue;
        };
        peers.insert(segment.challengee.as_str());
        peers.extend(segment.witnesses().iter().map(|w| w.gateway.as_str()));
    }
    peers
        .into_iter()
        .filter(|peer| !peer.is_empty() && *peer != address)
        .map(str::to_string)
        .collect()
}

/// Valid/invalid witness totals for every beacon `address` sent. Its own
/// witness reports are ignored and beacons nobody heard are left out.
pub fn beacon_validity(address: &str, records: &[ChallengeRecord]) -> Vec<BeaconCounts> {
    let mut counts = Vec::new();
    for record in poc_receipts(records) {
        let Some(segment) = record.first_segment() else {
            continue;
        };
        if segment.challengee != address {
            continue;
        }
        let (valid, invalid) = segment
            .witnesses()
            .iter()
            .filter(|w| w.gateway != address)
            .fold((0u32, 0u32), |(valid, invalid), w| {
                if w.is_valid() {
                    (valid + 1, invalid)
                } else {
                    (valid, invalid + 1)
                }
            });
        if valid == 0 && invalid == 0 {
            continue;
        }
        let Some(timestamp) = record_secs(record) else {
            tracing::debug!(hash = %record.hash, "beacon without time");
            continue;
        };
        counts.push(BeaconCounts {
            timestamp,
            hash: record.hash.clone(),
            valid,
            invalid,
        });
    }
    counts
}

fn challenge_results(
    records: &[ChallengeRecord],
    keep: impl Fn(&str) -> bool,
) -> Vec<ChallengeResult> {
    let mut results = Vec::new();
    for record in poc_receipts(records) {
        for segment in record.segments() {
            if !keep(&segment.challengee) {
                continue;
            }
            results.extend(segment.witnesses().iter().map(|w| ChallengeResult {
                timestamp: w.timestamp,
                address: w.gateway.clone(),
                signal: w.signal,
                location: w.location.clone(),
            }));
        }
    }
    results
}

/// Witness reports of beacons `address` transmitted.
pub fn tx_results(address: &str, records: &[ChallengeRecord]) -> Vec<ChallengeResult> {
    let results = challenge_results(records, |challengee| challengee == address);
    tracing::debug!(address, count = results.len(), "collected tx results");
    results
}

/// Witness reports of beacons other hotspots transmitted.
pub fn rx_results(address: &str, records: &[ChallengeRecord]) -> Vec<ChallengeResult> {
    let results = challenge_results(records, |challengee| challengee != address);
    tracing::debug!(address, count = results.len(), "collected rx results");
    results
}

/// `(seconds, dBm)` pairs of the results reported by `address`.
pub fn signal_series(address: &str, results: &[ChallengeResult]) -> Vec<(u64, f64)> {
    results
        .iter()
        .filter(|r| r.address == address)
        .map(|r| (r.timestamp / NANOS_PER_SEC, f64::from(r.signal)))
        .collect()
}

/// Event time (nanoseconds) of the lowest-height record above `height`.
pub fn time_for_height(height: u64, records: &[ChallengeRecord]) -> Option<u64> {
    let mut best: Option<(u64, u64)> = None;
    for record in records {
        if record.height <= height {
            continue;
        }
        if best.is_some_and(|(h, _)| record.height > h) {
            continue;
        }
        if let Ok(nanos) = record.event_time_nanos() {
            best = Some((record.height, nanos));
        }
    }
    best.map(|(_, nanos)| nanos)
}

/// Pairs hotspots through their witness reports.
pub struct WitnessEngine<L> {
    lookup: L,
}

impl<L: HotspotLookup> WitnessEngine<L> {
    pub fn new(lookup: L) -> Self {
        Self { lookup }
    }

    pub fn lookup_mut(&mut self) -> &mut L {
        &mut self.lookup
    }

    pub fn into_inner(self) -> L {
        self.lookup
    }

    /// Metadata for `address`, failing when unknown.
    pub fn hotspot(&mut self, address: &str) -> Result<Hotspot, AnalysisError> {
        self.lookup
            .lookup(address)?
            .ok_or_else(|| AnalysisError::UnknownHotspot(address.to_string()))
    }

    /// Every observation linking `observer` and `peer`.
    ///
    /// Segments `observer` transmitted are TX and keep only `peer`'s reports;
    /// all others are RX and keep only `observer`'s reports of `peer`'s
    /// beacons. An unknown observer is an error; an unknown peer yields no
    /// results.
    pub fn witness_results(
        &mut self,
        observer: &str,
        peer: &str,
        records: &[ChallengeRecord],
    ) -> Result<Vec<WitnessResult>, AnalysisError> {
        let observer_host = self.hotspot(observer)?;

        let mut matched: Vec<(&WitnessObservation, Direction, &str)> = Vec::new();
        for record in poc_receipts(records) {
            if let Err(err) = record.event_time_nanos() {
                tracing::debug!(hash = %record.hash, %err, "skipping record");
                continue;
            }
            for segment in record.segments() {
                let direction = if segment.challengee == observer {
                    Direction::Tx
                } else {
                    Direction::Rx
                };
                for witness in segment.witnesses() {
                    if witness.gateway == observer && segment.challengee != peer {
                        continue;
                    }
                    let keep = match direction {
                        Direction::Tx => witness.gateway == peer,
                        Direction::Rx => witness.gateway == observer,
                    };
                    if keep {
                        matched.push((witness, direction, record.hash.as_str()));
                    }
                }
            }
        }
        if matched.is_empty() {
            return Ok(Vec::new());
        }

        let Some(peer_host) = self.lookup.lookup(peer)? else {
            tracing::warn!(peer, "unable to look up peer");
            return Ok(Vec::new());
        };
        let distance = hotspot_distance(&observer_host, &peer_host);

        let results: Vec<_> = matched
            .into_iter()
            .map(|(witness, direction, hash)| WitnessResult {
                timestamp: witness.timestamp,
                address: observer.to_string(),
                witness: witness.gateway.clone(),
                direction,
                signal: witness.signal,
                snr: witness.snr,
                valid: witness.is_valid(),
                km: distance.km,
                mi: distance.mi,
                valid_threshold: min_rssi_for_snr(witness.snr),
                location: witness.location.clone(),
                hash: hash.to_string(),
            })
            .collect();
        tracing::debug!(observer, peer, count = results.len(), "found witness results");
        Ok(results)
    }

    /// Distance to the challengee of every beacon `address` witnessed.
    pub fn witness_distances(
        &mut self,
        address: &str,
        records: &[ChallengeRecord],
    ) -> Result<Vec<DistancePoint>, AnalysisError> {
        let host = self.hotspot(address)?;
        let mut points = Vec::new();
        for record in poc_receipts(records) {
            let Some(segment) = record.first_segment() else {
                continue;
            };
            if segment.challengee == address {
                continue;
            }
            let Some(witness) = segment.witnesses().iter().find(|w| w.gateway == address) else {
                continue;
            };
            let Some(challengee) = self.lookup.lookup(&segment.challengee)? else {
                tracing::warn!(challengee = %segment.challengee, "unable to look up challengee");
                continue;
            };
            let Some(timestamp) = record_secs(record) else {
                continue;
            };
            points.push(DistancePoint {
                timestamp,
                challengee: segment.challengee.clone(),
                km: hotspot_distance(&host, &challengee).km,
                valid: witness.is_valid(),
            });
        }
        Ok(points)
    }

    /// Numeric series for one observer/peer pair, `None` when neither
    /// direction has `min_samples` valid observations.
    pub fn peer_report(
        &mut self,
        observer: &str,
        peer: &str,
        records: &[ChallengeRecord],
        min_samples: usize,
    ) -> Result<Option<PeerReport>, AnalysisError> {
        let results = self.witness_results(observer, peer, records)?;
        if results.is_empty() {
            tracing::debug!(observer, peer, "no observations");
            return Ok(None);
        }
        let observer_host = self.hotspot(observer)?;
        let peer_host = self.hotspot(peer)?;

        let earliest = records.iter().filter_map(|r| r.event_time_nanos().ok()).min();
        let joined = time_for_height(peer_host.block_added, records)
            .filter(|&t| earliest.map_or(true, |e| t > e));

        Ok(PeerReport::build(&observer_host, &peer_host, results, min_samples, joined))
    }

    /// Reports for every peer of `observer` that has enough samples. Peers
    /// that fail are logged and skipped.
    pub fn peer_reports(
        &mut self,
        observer: &str,
        records: &[ChallengeRecord],
        min_samples: usize,
    ) -> Result<Vec<PeerReport>, AnalysisError> {
        self.hotspot(observer)?;
        let mut reports = Vec::new();
        for peer in unique_peers(observer, records) {
            match self.peer_report(observer, &peer, records, min_samples) {
                Ok(Some(report)) => reports.push(report),
                Ok(None) => {}
                Err(err) => tracing::error!(%peer, %err, "unable to process peer"),
            }
        }
        tracing::info!(observer, peers = reports.len(), "built peer reports");
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotspot_nullables::fixtures::{challenge, challenge_with_witnesses, witness};
    use std::collections::HashMap;

    fn hotspot(address: &str, lat: f64, lng: f64) -> Hotspot {
        Hotspot {
            address: address.into(),
            name: format!("{}-name-x", address.to_lowercase()),
            lat: Some(lat),
            lng: Some(lng),
            ..Default::default()
        }
    }

    fn directory() -> HashMap<String, Hotspot> {
        [hotspot("X", 40.0, -74.0), hotspot("Y", 40.1, -74.0), hotspot("Z", 40.0, -74.1)]
            .into_iter()
            .map(|h| (h.address.clone(), h))
            .collect()
    }

    #[test]
    fn direction_depends_on_observer() {
        let records = vec![challenge_with_witnesses("X", 100, vec![witness("Y", 100, -100, 5.0, true)])];
        let mut engine = WitnessEngine::new(directory());

        let tx = engine.witness_results("X", "Y", &records).unwrap();
        assert_eq!(tx.len(), 1);
        assert_eq!(tx[0].direction, Direction::Tx);
        assert_eq!(tx[0].witness, "Y");
        assert_eq!(tx[0].valid_threshold, Some(-115));
        assert!((tx[0].km - 11.12).abs() < 0.05);

        let rx = engine.witness_results("Y", "X", &records).unwrap();
        assert_eq!(rx.len(), 1);
        assert_eq!(rx[0].direction, Direction::Rx);
        assert_eq!(rx[0].address, "Y");
        assert_eq!(rx[0].timestamp, tx[0].timestamp);
    }

    #[test]
    fn third_party_observations_are_ignored() {
        // Z heard X; nothing links Y to that beacon.
        let records = vec![challenge_with_witnesses("X", 100, vec![witness("Z", 100, -100, 5.0, true)])];
        let mut engine = WitnessEngine::new(directory());
        assert!(engine.witness_results("X", "Y", &records).unwrap().is_empty());
        assert!(engine.witness_results("Y", "X", &records).unwrap().is_empty());
        // Y observing Z's beacon does not count toward Y <-> X.
        let records = vec![challenge_with_witnesses("Z", 100, vec![witness("Y", 100, -100, 5.0, true)])];
        assert!(engine.witness_results("Y", "X", &records).unwrap().is_empty());
        assert_eq!(engine.witness_results("Y", "Z", &records).unwrap().len(), 1);
    }

    #[test]
    fn unknown_observer_is_an_error_unknown_peer_is_skipped() {
        let records = vec![challenge_with_witnesses("X", 100, vec![witness("Q", 100, -100, 5.0, true)])];
        let mut engine = WitnessEngine::new(directory());
        assert!(matches!(
            engine.witness_results("nobody", "X", &records),
            Err(AnalysisError::UnknownHotspot(_))
        ));
        assert!(engine.witness_results("X", "Q", &records).unwrap().is_empty());
    }

    #[test]
    fn unknown_kinds_and_empty_records_are_skipped() {
        let mut other = challenge_with_witnesses("X", 100, vec![witness("Y", 100, -100, 5.0, true)]);
        other.kind = "poc_request_v1".into();
        let records = vec![other, challenge("X", 200)];
        let mut engine = WitnessEngine::new(directory());
        assert!(engine.witness_results("X", "Y", &records).unwrap().is_empty());
        assert!(unique_peers("X", &records).is_empty());
    }

    #[test]
    fn unique_peers_excludes_self() {
        let records = vec![
            challenge_with_witnesses("X", 100, vec![witness("Y", 100, -100, 5.0, true)]),
            challenge_with_witnesses("Z", 200, vec![witness("X", 200, -100, 5.0, true)]),
        ];
        assert_eq!(unique_peers("X", &records), vec!["Y".to_string(), "Z".to_string()]);
    }

    #[test]
    fn beacon_counts_skip_self_and_silent_beacons() {
        let records = vec![
            challenge_with_witnesses(
                "X",
                100,
                vec![
                    witness("Y", 100, -100, 5.0, true),
                    witness("Z", 100, -100, 5.0, false),
                    witness("X", 100, -100, 5.0, true),
                ],
            ),
            challenge_with_witnesses("X", 200, vec![witness("X", 200, -100, 5.0, true)]),
            challenge("X", 300),
            challenge_with_witnesses("Y", 400, vec![witness("X", 400, -100, 5.0, true)]),
        ];
        let counts = beacon_validity("X", &records);
        assert_eq!(
            counts,
            vec![BeaconCounts {
                timestamp: 100,
                hash: "X-100".into(),
                valid: 1,
                invalid: 1,
            }]
        );
    }

    #[test]
    fn tx_and_rx_results_split_by_challengee() {
        let records = vec![
            challenge_with_witnesses("X", 100, vec![witness("Y", 100, -101, 5.0, true)]),
            challenge_with_witnesses("Y", 200, vec![witness("X", 200, -102, 5.0, true)]),
        ];
        let tx = tx_results("X", &records);
        assert_eq!(tx.len(), 1);
        assert_eq!(tx[0].address, "Y");
        let rx = rx_results("X", &records);
        assert_eq!(rx.len(), 1);
        assert_eq!(signal_series("X", &rx), vec![(200, -102.0)]);
    }

    #[test]
    fn witness_distances_split_validity() {
        let records = vec![
            challenge_with_witnesses("Y", 100, vec![witness("X", 100, -100, 5.0, true)]),
            challenge_with_witnesses("Z", 200, vec![witness("X", 200, -100, 5.0, false)]),
            challenge_with_witnesses("X", 300, vec![witness("Y", 300, -100, 5.0, true)]),
        ];
        let mut engine = WitnessEngine::new(directory());
        let points = engine.witness_distances("X", &records).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].challengee, "Y");
        assert!(points[0].valid);
        assert!(!points[1].valid);
        assert!(points[0].km > 11.0);
    }

    #[test]
    fn time_for_height_picks_lowest_height_above() {
        let records = vec![challenge("X", 500), challenge("X", 300), challenge("X", 400)];
        assert_eq!(time_for_height(310, &records), Some(400 * NANOS_PER_SEC));
        assert_eq!(time_for_height(100, &records), Some(300 * NANOS_PER_SEC));
        assert_eq!(time_for_height(500, &records), None);
    }
}
