use serde::Deserialize;

use crate::error::ComputationError;

/// Options for GPX route analysis.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOptions {
    /// Average moving speed used for the duration estimate (default: 80 km/h)
    #[serde(default = "default_average_speed")]
    pub average_speed_kmh: f64,

    /// Multiplier applied to the moving time to account for stops (default: 1.1)
    #[serde(default = "default_stop_factor")]
    pub stop_factor: f64,

    /// Minimum bearing change counted as a curve, in degrees (default: 20)
    #[serde(default = "default_curve_threshold")]
    pub curve_threshold_deg: f64,

    /// How direction changes are turned into a curve count (default: perSegment)
    #[serde(default)]
    pub curve_detection: CurveDetection,

    /// Join track segments into a single MultiLineString (default: true).
    /// A joined multi-segment track is not a single line and is rejected;
    /// when false, the first segment is analyzed on its own.
    #[serde(default = "default_true")]
    pub join_track_segments: bool,

    /// What to do when a scenic section holds no samples (default: skip)
    #[serde(default)]
    pub empty_scenic_section: EmptySectionPolicy,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            average_speed_kmh: default_average_speed(),
            stop_factor: default_stop_factor(),
            curve_threshold_deg: default_curve_threshold(),
            curve_detection: CurveDetection::default(),
            join_track_segments: true,
            empty_scenic_section: EmptySectionPolicy::default(),
        }
    }
}

impl AnalysisOptions {
    /// Reject values that would turn the estimates into NaN or infinity.
    pub fn validate(&self) -> Result<(), ComputationError> {
        let checks = [
            ("averageSpeedKmh", self.average_speed_kmh, self.average_speed_kmh > 0.0),
            ("stopFactor", self.stop_factor, self.stop_factor > 0.0),
            ("curveThresholdDeg", self.curve_threshold_deg, self.curve_threshold_deg >= 0.0),
        ];
        for (option, value, in_range) in checks {
            if !value.is_finite() || !in_range {
                return Err(ComputationError::InvalidOption { option, value });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CurveDetection {
    /// Every interior point whose bearing change exceeds the threshold counts once.
    /// A long sweeping bend spanning k points counts k times; the fun score is
    /// calibrated against this.
    #[default]
    PerSegment,
    /// Consecutive over-threshold points are merged into a single curve.
    MergedRuns,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EmptySectionPolicy {
    /// Emit fewer than three scenic spots.
    #[default]
    Skip,
    /// Fail the analysis with a computation error.
    Fail,
}

fn default_average_speed() -> f64 {
    80.0
}

fn default_stop_factor() -> f64 {
    1.1
}

fn default_curve_threshold() -> f64 {
    20.0
}

fn default_true() -> bool {
    true
}
