use crate::geo_math::{bearing_delta_deg, initial_bearing_deg};
use crate::options::CurveDetection;
use crate::track::GeoPoint;

/// Default minimum bearing change, in degrees, for a point to count as a curve.
pub const CURVE_THRESHOLD_DEG: f64 = 20.0;

/// Bearing change at every interior point, in degrees `[0, 180]`.
///
/// Entry `i` belongs to point `i + 1`. Tracks with fewer than three points
/// have no interior points.
pub fn direction_changes(points: &[GeoPoint]) -> Vec<f64> {
    points
        .windows(3)
        .map(|w| {
            let b1 = initial_bearing_deg(&w[0], &w[1]);
            let b2 = initial_bearing_deg(&w[1], &w[2]);
            bearing_delta_deg(b1, b2)
        })
        .collect()
}

/// Count significant direction changes along a track.
///
/// Elevation is ignored.
pub fn count_curves(points: &[GeoPoint], threshold_deg: f64, detection: CurveDetection) -> usize {
    let turns = direction_changes(points).into_iter().map(|d| d > threshold_deg);

    match detection {
        CurveDetection::PerSegment => turns.filter(|&t| t).count(),
        CurveDetection::MergedRuns => {
            let mut curves = 0;
            let mut in_curve = false;
            for turning in turns {
                if turning && !in_curve {
                    curves += 1;
                }
                in_curve = turning;
            }
            curves
        }
    }
}
