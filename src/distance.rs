use crate::gps_processor::CoordinateFix;

pub const EARTH_RADIUS: f64 = 6371000.0; // unit: meter

// Great-circle distance on a spherical earth (haversine). Inputs are in
// degrees, NaN/Inf are passed through rather than validated.
pub fn distance_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let lat1 = lat1.to_radians();
    let lat2 = lat2.to_radians();
    let d_lat = lat2 - lat1;
    let d_lng = (lng2 - lng1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    // `min` guards against `a` drifting slightly above 1 due to rounding.
    let c = 2.0 * a.sqrt().min(1.0).asin();
    EARTH_RADIUS * c
}

pub fn distance_between(a: &CoordinateFix, b: &CoordinateFix) -> f64 {
    distance_m(a.latitude, a.longitude, b.latitude, b.longitude)
}

// Sum of the distances between consecutive fixes.
pub fn path_length_m(fixes: &[CoordinateFix]) -> f64 {
    fixes
        .windows(2)
        .map(|pair| distance_between(&pair[0], &pair[1]))
        .sum()
}

/// A heuristic score in `[0, 100]` of how trustworthy a single fix is,
/// based on its reported horizontal accuracy and how old it is at `now_ms`.
pub fn fix_quality(fix: &CoordinateFix, now_ms: i64) -> u8 {
    // a non-finite accuracy says as much as a missing one
    let accuracy_penalty: u8 = match fix.accuracy.filter(|accuracy| accuracy.is_finite()) {
        None => 40,
        Some(accuracy) if accuracy > 100.0 => 50,
        Some(accuracy) if accuracy > 50.0 => 30,
        Some(accuracy) if accuracy > 20.0 => 15,
        Some(accuracy) if accuracy > 10.0 => 5,
        Some(_) => 0,
    };

    let age_ms = now_ms.saturating_sub(fix.timestamp_ms);
    let staleness_penalty: u8 = if age_ms > 60_000 {
        30
    } else if age_ms > 30_000 {
        15
    } else if age_ms > 10_000 {
        5
    } else {
        0
    };

    100u8
        .saturating_sub(accuracy_penalty)
        .saturating_sub(staleness_penalty)
}

// Average speed between two fixes. When the fixes share a timestamp (or come
// in reverse order) there is no usable time delta, so fall back to the speed
// reported by the later fix.
pub fn speed_m_per_s(a: &CoordinateFix, b: &CoordinateFix) -> f64 {
    let dt_sec = (b.timestamp_ms - a.timestamp_ms) as f64 / 1000.0;
    if dt_sec <= 0.0 {
        let later = if a.timestamp_ms > b.timestamp_ms { a } else { b };
        return later.speed.map(f64::from).unwrap_or(0.0);
    }
    distance_between(a, b) / dt_sec
}
