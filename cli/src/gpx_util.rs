use std::{
    io::{Read, Write},
    str::FromStr,
    time::SystemTime,
};

use anyhow::{Context, bail};
use chrono::{DateTime, TimeDelta, Utc};
use gpx::{GpxVersion, Time, Track, TrackSegment, Waypoint};
use time::OffsetDateTime;
use walkie_lib::position::{Position, route_line};

/// Flattens every track and segment of a GPX document into one ordered list of positions.
///
/// Points without a timestamp are placed one second after the previous point, or at the
/// metadata time if the very first point has none.
pub fn read_track(reader: impl Read) -> anyhow::Result<Vec<Position>> {
    let gpx = gpx::read(reader).context("failed to parse GPX")?;

    let mut time = match gpx.metadata.as_ref().and_then(|meta| meta.time.clone()) {
        Some(t) => parse_time(&t)?,
        None => DateTime::<Utc>::UNIX_EPOCH,
    };
    let mut first = true;

    let mut positions = Vec::new();
    for track in gpx.tracks {
        for segment in track.segments {
            for point in segment.points {
                time = match &point.time {
                    Some(t) => parse_time(t)?,
                    None if first => time,
                    None => time + TimeDelta::seconds(1),
                };
                first = false;

                // hdop is unitless and never lands in `accuracy`.
                let location = point.point();
                positions.push(Position::new(location.y(), location.x(), time));
            }
        }
    }

    if positions.is_empty() {
        bail!("GPX file contains no track points");
    }
    Ok(positions)
}

/// Writes a route as a single-segment GPX 1.1 track.
pub fn write_track(route: &[Position], name: &str, writer: impl Write) -> anyhow::Result<()> {
    let mut gpx = gpx::Gpx::default();
    gpx.version = GpxVersion::Gpx11;
    gpx.metadata = Some(gpx::Metadata {
        name: Some(name.to_string()),
        time: route.first().map(|p| to_gpx_time(p.timestamp)),
        ..Default::default()
    });

    let mut segment = TrackSegment::new();
    for (point, position) in route_line(route).points().zip(route) {
        let mut wp = Waypoint::new(point);
        wp.time = Some(to_gpx_time(position.timestamp));
        segment.points.push(wp);
    }

    let mut track = Track::new();
    track.name = Some(name.to_string());
    track.segments.push(segment);
    gpx.tracks.push(track);

    gpx::write(&gpx, writer).context("failed to write GPX")?;
    Ok(())
}

fn parse_time(time: &Time) -> anyhow::Result<DateTime<Utc>> {
    let text = time.format().context("unreadable GPX timestamp")?;
    DateTime::from_str(&text).with_context(|| format!("invalid GPX timestamp {text}"))
}

fn to_gpx_time(timestamp: DateTime<Utc>) -> Time {
    let time: SystemTime = timestamp.into();
    let time: OffsetDateTime = time.into();
    Time::from(time)
}
