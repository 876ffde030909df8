//! Record builders shared by tests across the workspace.

use hotspot_types::{ChallengeRecord, PathSegment, Receipt, WitnessObservation, POC_RECEIPTS_V1};

const NANOS: u64 = 1_000_000_000;

/// A `poc_receipts_v1` record whose event time is `secs`, taken from a
/// receipt by `challengee`, with no witnesses.
pub fn challenge(challengee: &str, secs: u64) -> ChallengeRecord {
    ChallengeRecord {
        kind: POC_RECEIPTS_V1.to_string(),
        time: secs,
        secret: None,
        path: Some(vec![PathSegment {
            challengee: challengee.to_string(),
            witnesses: Some(Vec::new()),
            receipt: Some(Receipt {
                timestamp: secs * NANOS,
                signal: -100,
                origin: Some("p2p".to_string()),
                gateway: challengee.to_string(),
                data: None,
            }),
            ..Default::default()
        }]),
        onion_key_hash: None,
        height: secs,
        hash: format!("{challengee}-{secs}"),
        fee: 0,
        challenger: None,
        challenger_owner: None,
        challenger_lat: None,
        challenger_lon: None,
        challenger_location: None,
    }
}

/// [`challenge`] with the given witnesses on segment 0.
pub fn challenge_with_witnesses(
    challengee: &str,
    secs: u64,
    witnesses: Vec<WitnessObservation>,
) -> ChallengeRecord {
    let mut record = challenge(challengee, secs);
    if let Some(segment) = record.path.as_mut().and_then(|p| p.first_mut()) {
        segment.witnesses = Some(witnesses);
    }
    record
}

/// A witness report by `gateway` at `secs`.
pub fn witness(gateway: &str, secs: u64, signal: i32, snr: f64, valid: bool) -> WitnessObservation {
    WitnessObservation {
        gateway: gateway.to_string(),
        timestamp: secs * NANOS,
        signal,
        snr,
        is_valid: Some(valid),
        location: Some(format!("loc-{gateway}")),
        packet_hash: Some(format!("pkt-{secs}")),
        owner: None,
    }
}
