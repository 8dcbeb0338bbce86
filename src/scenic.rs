use serde::Serialize;

use crate::error::ComputationError;
use crate::options::EmptySectionPolicy;
use crate::stats::ElevationSample;
use crate::track::GeoPoint;

/// Highest point of one route section.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenicSpot {
    pub point: GeoPoint,
    pub elevation: f64,
    pub distance_km: f64,
    pub ranking: u8,
    pub description: String,
}

/// Distance bounds `[start, end]` of the three scenic sections.
///
/// The route is cut in quarters and the first quarter is left out.
pub fn scenic_sections(total_km: f64) -> [(f64, f64); 3] {
    let quarter = total_km / 4.0;
    [
        (quarter, quarter * 2.0),
        (quarter * 2.0, quarter * 3.0),
        (quarter * 3.0, total_km),
    ]
}

/// Nearest integer, halves towards positive infinity. Never yields `-0`.
fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor() + 0.0
}

/// Pick the highest sample of each section as a scenic spot.
///
/// Bounds are inclusive and the earliest sample wins ties. A section without
/// samples is skipped or reported, depending on `policy`.
pub fn analyze_scenic_spots(
    samples: &[ElevationSample],
    policy: EmptySectionPolicy,
) -> Result<Vec<ScenicSpot>, ComputationError> {
    let Some(last) = samples.last() else {
        return Ok(Vec::new());
    };

    let mut spots = Vec::with_capacity(3);
    for (ranking, (start, end)) in (1u8..).zip(scenic_sections(last.distance_km)) {
        let highest = samples
            .iter()
            .filter(|s| s.distance_km >= start && s.distance_km <= end)
            .reduce(|max, s| if s.elevation > max.elevation { s } else { max });

        match (highest, policy) {
            (Some(s), _) => spots.push(ScenicSpot {
                point: s.point,
                elevation: s.elevation,
                distance_km: s.distance_km,
                ranking,
                description: format!("Peak {ranking} - {}m", round_half_up(s.elevation)),
            }),
            (None, EmptySectionPolicy::Skip) => {
                log::debug!("scenic section {ranking} [{start:.3}, {end:.3}] km has no samples");
            }
            (None, EmptySectionPolicy::Fail) => {
                return Err(ComputationError::EmptyScenicSection { ranking });
            }
        }
    }

    Ok(spots)
}
