use serde::Serialize;

use crate::geo_math::haversine_km;
use crate::options::AnalysisOptions;
use crate::track::{BoundingBox, GeoPoint, Track};

/// Aggregate metrics of a track. Derived once, never patched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStats {
    pub distance_km: f64,
    pub elevation_range_m: f64,
    pub duration_estimate_seconds: f64,
    pub elevation_gain_m: f64,
    pub elevation_loss_m: f64,
    pub min_elevation_m: f64,
    pub max_elevation_m: f64,
}

impl RouteStats {
    /// Whole hours and remaining minutes of the duration estimate.
    pub fn duration_hours_minutes(&self) -> (u64, u64) {
        let secs = self.duration_estimate_seconds.max(0.0) as u64;
        (secs / 3600, (secs % 3600) / 60)
    }
}

/// One of the five markers placed along a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    Start,
    Intermediate(u8),
    Finish,
}

impl Checkpoint {
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Start),
            1..=3 => Some(Self::Intermediate(index)),
            4 => Some(Self::Finish),
            _ => None,
        }
    }

    pub fn index(&self) -> u8 {
        match self {
            Self::Start => 0,
            Self::Intermediate(i) => *i,
            Self::Finish => 4,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Start => "Start".to_string(),
            Self::Intermediate(i) => format!("Checkpoint {i}"),
            Self::Finish => "Finish".to_string(),
        }
    }
}

/// A point of the elevation chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElevationSample {
    pub distance_km: f64,
    pub elevation: f64,
    pub point: GeoPoint,
    pub is_checkpoint: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_index: Option<u8>,
}

impl ElevationSample {
    pub fn checkpoint(&self) -> Option<Checkpoint> {
        self.checkpoint_index.and_then(Checkpoint::from_index)
    }
}

/// Everything the stats engine derives from a track.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteProfile {
    pub stats: RouteStats,
    pub samples: Vec<ElevationSample>,
    pub bounds: BoundingBox,
}

/// Point indices of checkpoints 0..=4 for a track of `n` points.
///
/// Short tracks produce repeated indices; a point then takes the lowest
/// checkpoint number that names it.
pub fn checkpoint_indices(n: usize) -> [usize; 5] {
    [0, n / 4, n / 2, 3 * n / 4, n.saturating_sub(1)]
}

/// Compute distance, elevation aggregates, the sample series and bounds.
pub fn compute_profile(track: &Track, opts: &AnalysisOptions) -> RouteProfile {
    let points = track.points();
    let checkpoints = checkpoint_indices(points.len());

    let first_elevation = points[0].elevation_or_zero();
    let mut min_elevation = first_elevation;
    let mut max_elevation = first_elevation;
    let mut elevation_gain = 0.0;
    let mut elevation_loss = 0.0;
    let mut total_distance = 0.0;
    let mut samples = Vec::with_capacity(points.len());

    for (index, point) in points.iter().enumerate() {
        let elevation = point.elevation_or_zero();
        min_elevation = f64::min(min_elevation, elevation);
        max_elevation = f64::max(max_elevation, elevation);

        if index > 0 {
            let prev = &points[index - 1];
            total_distance += haversine_km(prev, point);

            let diff = elevation - prev.elevation_or_zero();
            if diff > 0.0 {
                elevation_gain += diff;
            } else {
                elevation_loss += diff.abs();
            }
        }

        let checkpoint_index = checkpoints
            .iter()
            .position(|&i| i == index)
            .map(|i| i as u8);

        samples.push(ElevationSample {
            distance_km: total_distance,
            elevation,
            point: *point,
            is_checkpoint: checkpoint_index.is_some(),
            checkpoint_index,
        });
    }

    let duration = (total_distance / opts.average_speed_kmh) * 3600.0 * opts.stop_factor;

    let missing = track.missing_elevations();
    if missing > 0 {
        log::debug!(
            "{missing} of {} points have no elevation, counted as 0 m",
            points.len()
        );
    }

    RouteProfile {
        stats: RouteStats {
            distance_km: total_distance,
            elevation_range_m: max_elevation - min_elevation,
            duration_estimate_seconds: duration,
            elevation_gain_m: elevation_gain,
            elevation_loss_m: elevation_loss,
            min_elevation_m: min_elevation,
            max_elevation_m: max_elevation,
        },
        samples,
        bounds: track.bounds(),
    }
}
