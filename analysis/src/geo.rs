//! Great-circle distance.

use hotspot_types::Hotspot;

pub const EARTH_RADIUS_KM: f64 = 6371.0;
pub const EARTH_RADIUS_MI: f64 = 3958.0;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Distance {
    pub km: f64,
    pub mi: f64,
}

/// Haversine distance between two `(lat, lng)` pairs in degrees.
pub fn distance(a: (f64, f64), b: (f64, f64)) -> Distance {
    let (lat1, lng1) = a;
    let (lat2, lng2) = b;
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    Distance {
        km: EARTH_RADIUS_KM * c,
        mi: EARTH_RADIUS_MI * c,
    }
}

/// Distance between two hotspots; zero when either has no asserted location.
pub fn hotspot_distance(a: &Hotspot, b: &Hotspot) -> Distance {
    match (a.coordinates(), b.coordinates()) {
        (Some(a), Some(b)) => distance(a, b),
        _ => Distance::default(),
    }
}
