use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use geo_types::Point;
use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};

use crate::error::NavError;
use crate::models::{Coordinate, RoutePlan};

const CREATOR: &str = "scootnav";

/// Encodes the plan path as a base64 GPX 1.1 track; maneuvers become named
/// waypoints.
pub fn encode_plan_as_gpx(plan: &RoutePlan, name: &str) -> Result<String, NavError> {
    if plan.coordinates.is_empty() {
        return Err(NavError::NoNavigationPath);
    }

    let mut gpx = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some(CREATOR.into()),
        ..Default::default()
    };
    let mut track = Track {
        name: Some(name.into()),
        ..Default::default()
    };

    let mut segment = TrackSegment::new();
    segment.points.extend(plan.coordinates.iter().map(to_waypoint));
    track.segments.push(segment);
    gpx.tracks.push(track);

    for maneuver in &plan.maneuvers {
        let mut waypoint = to_waypoint(&maneuver.location);
        waypoint.name = Some(maneuver.instruction.clone());
        waypoint.type_ = Some(maneuver.kind.clone());
        gpx.waypoints.push(waypoint);
    }

    let mut buffer = Vec::new();
    gpx::write(&gpx, &mut buffer)?;
    Ok(BASE64.encode(buffer))
}

fn to_waypoint(coord: &Coordinate) -> Waypoint {
    Waypoint::new(Point::new(coord.lon, coord.lat))
}
