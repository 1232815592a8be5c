#![allow(dead_code)]

use fittrack_core::gps_processor::CoordinateFix;
use std::fs;
use std::path::Path;

pub const START_LAT: f64 = 37.7749;
pub const START_LNG: f64 = -122.4194;
pub const START_MS: i64 = 1_697_349_116_000;

// meters per degree of latitude on the sphere we use
pub const M_PER_DEG_LAT: f64 = 111_194.926_644_558_7;

// A straight run heading north: one fix per second, `step_m` meters apart.
pub fn synthetic_run(count: usize, step_m: f64) -> Vec<CoordinateFix> {
    (0..count)
        .map(|i| CoordinateFix {
            latitude: START_LAT + (i as f64 * step_m) / M_PER_DEG_LAT,
            longitude: START_LNG,
            timestamp_ms: START_MS + i as i64 * 1000,
            speed: Some(step_m as f32),
            altitude: Some(12.5),
            accuracy: Some(5.0),
        })
        .collect()
}

// A run that zig-zags east/west so consecutive segments are not collinear.
pub fn zig_zag_run(count: usize) -> Vec<CoordinateFix> {
    (0..count)
        .map(|i| {
            let mut fix = CoordinateFix::new(
                START_LAT + i as f64 * 0.0001,
                START_LNG + if i % 2 == 0 { 0. } else { 0.0002 },
                START_MS + i as i64 * 2000,
            );
            fix.accuracy = Some(8.0);
            fix
        })
        .collect()
}

pub fn sub_folder(root: &Path, sub: &str) -> String {
    let path = root.join(sub);
    fs::create_dir_all(&path).unwrap();
    path.into_os_string().into_string().unwrap()
}
