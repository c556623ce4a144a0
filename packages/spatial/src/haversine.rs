//! Great-circle helpers on the unit sphere.
//!
//! Distances are central angles in radians, i.e. haversine distances on a
//! sphere of radius 1.

use geo::{Distance as _, HaversineMeasure, Point};
use site_scout_geography_models::LatLon;

/// Haversine on a unit sphere: distances come out as central angles.
const UNIT_SPHERE: HaversineMeasure = HaversineMeasure::new(1.0);

/// Central angle between two coordinates given in degrees.
#[must_use]
pub fn central_angle(a: LatLon, b: LatLon) -> f64 {
    UNIT_SPHERE.distance(Point::new(a.lon, a.lat), Point::new(b.lon, b.lat))
}

/// Maps a `(lat, lon)` radian pair onto the unit sphere.
///
/// Chord length between two unit vectors grows monotonically with their
/// central angle, so Euclidean queries on these vectors answer haversine
/// neighborhood questions exactly.
#[must_use]
pub fn unit_vector((lat, lon): (f64, f64)) -> [f64; 3] {
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

/// Chord length that subtends the given central angle.
#[must_use]
pub fn chord_length(angle: f64) -> f64 {
    2.0 * (angle / 2.0).sin()
}
