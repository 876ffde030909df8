//! RSSI validity model for 915 MHz beacons.

/// Returned by [`max_rssi`] for co-located hotspots: any RSSI is plausible.
pub const UNBOUNDED_RSSI: f64 = -1000.0;

const TX_POWER_DBM: f64 = 28.0;
/// Antenna gain on both ends, 1.8 dBi each.
const ANTENNA_GAIN_DB: f64 = 3.6;
const FREQUENCY_MHZ: f64 = 915.0;
const FSPL_CONSTANT: f64 = 32.44;

/// Strongest RSSI that free-space path loss allows at `km`.
pub fn max_rssi(km: f64) -> f64 {
    if km < 0.001 {
        return UNBOUNDED_RSSI;
    }
    TX_POWER_DBM + ANTENNA_GAIN_DB - 20.0 * km.log10() - 20.0 * FREQUENCY_MHZ.log10()
        - FSPL_CONSTANT
}

/// Minimum valid RSSI indexed by `SNR - MIN_SNR`, for SNR in `[-20, 16]`.
const MIN_RSSI_BY_SNR: [i32; 37] = [
    -123, -123, -123, -123, -123, // -20..=-16
    -124, // -15
    -125, -125, -125, -125, -125, -125, -125, // -14..=-8
    -123, // -7
    -124, // -6
    -125, -125, -125, -125, -125, -125, // -5..=0
    -120, // 1
    -117, // 2
    -115, -115, -115, // 3..=5
    -113, // 6
    -108, // 7
    -105, // 8
    -95,  // 9
    -90, -90, -90, -90, -90, -90, -90, // 10..=16
];
const MIN_SNR: i32 = -20;
const MAX_SNR: i32 = 16;

/// Weakest RSSI considered valid at `snr`, looked up by the SNR's ceiling.
/// `None` when the table has no entry.
pub fn min_rssi_for_snr(snr: f64) -> Option<i32> {
    if !snr.is_finite() {
        return None;
    }
    let key = snr.ceil();
    if key < MIN_SNR as f64 || key > MAX_SNR as f64 {
        return None;
    }
    MIN_RSSI_BY_SNR.get((key as i32 - MIN_SNR) as usize).copied()
}
