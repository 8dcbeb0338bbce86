//! Spherical geometry used by the stats engine and the curvature analyzer.
//!
//! Both formulas work on a sphere; the Earth radius is the 6371 km mean
//! radius so distances line up with what route planners usually display.

use geo::{Bearing, Distance, Haversine, HaversineMeasure, Point};

use crate::track::GeoPoint;

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

fn to_point(p: &GeoPoint) -> Point<f64> {
    Point::new(p.lon, p.lat)
}

/// Great-circle distance between two points in kilometers (haversine formula).
///
/// Elevation is ignored.
pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let sphere = HaversineMeasure::new(EARTH_RADIUS_KM * 1000.0);
    sphere.distance(to_point(a), to_point(b)) / 1000.0
}

/// Initial bearing (forward azimuth) from `a` to `b` in degrees, in `[0, 360)`.
///
/// 0 is north, 90 east, 270 west.
pub fn initial_bearing_deg(a: &GeoPoint, b: &GeoPoint) -> f64 {
    Haversine.bearing(to_point(a), to_point(b))
}

/// Absolute difference between two bearings folded into `[0, 180]`.
pub fn bearing_delta_deg(b1: f64, b2: f64) -> f64 {
    let diff = (b1 - b2).abs() % 360.0;
    if diff > 180.0 { 360.0 - diff } else { diff }
}
