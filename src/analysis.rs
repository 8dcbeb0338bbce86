use serde::Serialize;

use crate::curvature::count_curves;
use crate::error::RouteError;
use crate::fun_score::{FunScoreInputs, Rating, calculate_fun_score};
use crate::options::AnalysisOptions;
use crate::parser::parse_track;
use crate::scenic::{ScenicSpot, analyze_scenic_spots};
use crate::stats::{ElevationSample, RouteStats, compute_profile};
use crate::track::{BoundingBox, Track};

/// Everything the route page shows about a GPX track.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteAnalysis {
    pub name: Option<String>,
    pub coordinates: Vec<[f64; 2]>,
    pub bounds: BoundingBox,
    pub stats: RouteStats,
    pub elevation_profile: Vec<ElevationSample>,
    pub curve_count: usize,
    pub fun_score: u8,
    pub rating: Rating,
    pub scenic_spots: Vec<ScenicSpot>,
}

/// Parse a GPX document and run the full analysis on its primary line.
pub fn analyze_gpx(xml: &str, opts: &AnalysisOptions) -> Result<RouteAnalysis, RouteError> {
    let parsed = parse_track(xml, opts)?;
    let mut analysis = analyze_track(&parsed.track, opts)?;
    analysis.name = parsed.name;
    Ok(analysis)
}

/// Run stats, curvature, fun score and scenic spot detection on a track.
pub fn analyze_track(track: &Track, opts: &AnalysisOptions) -> Result<RouteAnalysis, RouteError> {
    opts.validate()?;
    let profile = compute_profile(track, opts);
    let curve_count = count_curves(track.points(), opts.curve_threshold_deg, opts.curve_detection);
    let fun_score = calculate_fun_score(&FunScoreInputs::from_stats(&profile.stats, curve_count));
    let scenic_spots = analyze_scenic_spots(&profile.samples, opts.empty_scenic_section)?;

    log::debug!(
        "analyzed {} points: {:.1} km, +{:.0}/-{:.0} m, {} curves, fun score {}",
        track.len(),
        profile.stats.distance_km,
        profile.stats.elevation_gain_m,
        profile.stats.elevation_loss_m,
        curve_count,
        fun_score
    );

    Ok(RouteAnalysis {
        name: None,
        coordinates: track.coordinates(),
        bounds: profile.bounds,
        stats: profile.stats,
        elevation_profile: profile.samples,
        curve_count,
        fun_score,
        rating: Rating::from_score(fun_score),
        scenic_spots,
    })
}
