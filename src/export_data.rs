use anyhow::Result;
use geo_types::Point;
use gpx::{Gpx, GpxVersion, Time, Track, TrackSegment, Waypoint};
use std::io::Write;
use time::OffsetDateTime;

use crate::gps_processor::CoordinateFix;

fn waypoint_of_fix(fix: &CoordinateFix) -> Result<Waypoint> {
    // geo points are (x, y) = (lng, lat)
    let mut waypoint = Waypoint::new(Point::new(fix.longitude, fix.latitude));
    waypoint.elevation = fix.altitude.map(f64::from);
    let time = OffsetDateTime::from_unix_timestamp_nanos(fix.timestamp_ms as i128 * 1_000_000)?;
    waypoint.time = Some(Time::from(time));
    Ok(waypoint)
}

pub fn route_to_gpx(name: &str, fixes: &[CoordinateFix]) -> Result<Gpx> {
    let points = fixes
        .iter()
        .map(waypoint_of_fix)
        .collect::<Result<Vec<_>>>()?;
    let mut segment = TrackSegment::new();
    segment.points = points;
    let mut track = Track::new();
    track.name = Some(name.to_owned());
    track.segments.push(segment);
    Ok(Gpx {
        version: GpxVersion::Gpx11,
        creator: Some("fittrack".to_owned()),
        tracks: vec![track],
        ..Default::default()
    })
}

pub fn route_to_gpx_file<W: Write>(name: &str, fixes: &[CoordinateFix], writer: W) -> Result<()> {
    let gpx = route_to_gpx(name, fixes)?;
    gpx::write(&gpx, writer)?;
    Ok(())
}
