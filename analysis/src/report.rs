//! Per-peer report: the plain numeric series a chart renderer consumes.

use serde::{Deserialize, Serialize};

use hotspot_types::{Direction, Hotspot, WitnessResult};

use crate::validity::max_rssi;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Nanoseconds since epoch.
    pub timestamp: u64,
    pub value: f64,
}

/// Observations in one direction, split by validity. `combined` merges both
/// newest first, for moving averages.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectionSeries {
    pub valid: Vec<SeriesPoint>,
    pub invalid: Vec<SeriesPoint>,
    pub combined: Vec<SeriesPoint>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeerReport {
    pub observer: String,
    pub observer_name: String,
    pub peer: String,
    pub peer_name: String,
    pub title: String,
    pub km: f64,
    pub mi: f64,
    /// Free-space ceiling at the pair's distance.
    pub max_valid_rssi: f64,
    /// Present only when the direction has enough valid samples.
    pub tx: Option<DirectionSeries>,
    pub rx: Option<DirectionSeries>,
    /// Minimum valid RSSI for each observation's SNR.
    pub min_valid_rssi: Vec<(u64, Option<i32>)>,
    pub snr: Vec<SeriesPoint>,
    /// When the peer joined, if that falls inside the records' time span.
    pub joined: Option<u64>,
    pub results: Vec<WitnessResult>,
}

fn display_name(hotspot: &Hotspot) -> &str {
    if hotspot.name.is_empty() {
        &hotspot.address
    } else {
        &hotspot.name
    }
}

impl PeerReport {
    /// Assemble a report from `results` (as ordered by the records, newest
    /// first). `None` when neither direction has `min_samples` valid points.
    pub fn build(
        observer: &Hotspot,
        peer: &Hotspot,
        results: Vec<WitnessResult>,
        min_samples: usize,
        joined: Option<u64>,
    ) -> Option<Self> {
        let first = results.first()?;
        let (km, mi) = (first.km, first.mi);

        let mut tx = DirectionSeries::default();
        let mut rx = DirectionSeries::default();
        let mut min_valid_rssi = Vec::with_capacity(results.len());
        let mut snr = Vec::with_capacity(results.len());
        for result in &results {
            let point = SeriesPoint {
                timestamp: result.timestamp,
                value: f64::from(result.signal),
            };
            let series = match result.direction {
                Direction::Tx => &mut tx,
                Direction::Rx => &mut rx,
            };
            if result.valid {
                series.valid.push(point);
            } else {
                series.invalid.push(point);
            }
            min_valid_rssi.push((result.timestamp, result.valid_threshold));
            snr.push(SeriesPoint {
                timestamp: result.timestamp,
                value: result.snr,
            });
        }

        let keep = |mut series: DirectionSeries| {
            if series.valid.len() < min_samples {
                return None;
            }
            series.combined = merge_descending(&series.valid, &series.invalid);
            Some(series)
        };
        let tx = keep(tx);
        let rx = keep(rx);
        if tx.is_none() && rx.is_none() {
            tracing::debug!(observer = %observer.address, peer = %peer.address, "not enough samples");
            return None;
        }

        let observer_name = display_name(observer).to_string();
        let peer_name = display_name(peer).to_string();
        let title = format!(
            "{observer_name} <=> {peer_name} ({km:.2}km/{mi:.2}mi) [{:.2}] {}",
            peer.reward_scale.unwrap_or_default(),
            peer.online_status(),
        );
        Some(Self {
            observer: observer.address.clone(),
            observer_name,
            peer: peer.address.clone(),
            peer_name,
            title: title.trim_end().to_string(),
            km,
            mi,
            max_valid_rssi: max_rssi(km),
            tx,
            rx,
            min_valid_rssi,
            snr,
            joined,
            results,
        })
    }

    /// Total points across both directions that made it into the report.
    pub fn data_points(&self) -> usize {
        [&self.tx, &self.rx]
            .into_iter()
            .flatten()
            .map(|s| s.valid.len() + s.invalid.len())
            .sum()
    }
}

/// Merge two newest-first series into one, still newest first. On equal
/// timestamps the point from `b` goes first.
pub fn merge_descending(a: &[SeriesPoint], b: &[SeriesPoint]) -> Vec<SeriesPoint> {
    let mut merged = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i].timestamp > b[j].timestamp {
            merged.push(a[i]);
            i += 1;
        } else {
            merged.push(b[j]);
            j += 1;
        }
    }
    merged.extend_from_slice(&a[i..]);
    merged.extend_from_slice(&b[j..]);
    merged
}
