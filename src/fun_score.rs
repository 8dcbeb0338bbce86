//! Composite "fun score" of a route and its qualitative rating.
//!
//! Each metric is normalized against a reference ceiling and clamped to 100:
//!
//! | Metric | Ceiling | Weight |
//! |--------|---------|--------|
//! | curves | 50 | 0.4 |
//! | elevation gain | 2000 m | 0.2 |
//! | elevation loss | 2000 m | 0.2 |
//! | max elevation | 3000 m | 0.2 |
//!
//! Distance is part of the inputs but carries no weight.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::stats::RouteStats;

const CURVES_CEILING: f64 = 50.0;
const ELEVATION_GAIN_CEILING_M: f64 = 2000.0;
const ELEVATION_LOSS_CEILING_M: f64 = 2000.0;
const MAX_ELEVATION_CEILING_M: f64 = 3000.0;

const CURVES_WEIGHT: f64 = 0.4;
const ELEVATION_GAIN_WEIGHT: f64 = 0.2;
const ELEVATION_LOSS_WEIGHT: f64 = 0.2;
const MAX_ELEVATION_WEIGHT: f64 = 0.2;

/// Route metrics the score is computed from.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FunScoreInputs {
    pub curve_count: usize,
    pub distance_km: f64,
    pub elevation_gain_m: f64,
    pub elevation_loss_m: f64,
    pub max_elevation_m: f64,
}

impl FunScoreInputs {
    pub fn from_stats(stats: &RouteStats, curve_count: usize) -> Self {
        Self {
            curve_count,
            distance_km: stats.distance_km,
            elevation_gain_m: stats.elevation_gain_m,
            elevation_loss_m: stats.elevation_loss_m,
            max_elevation_m: stats.max_elevation_m,
        }
    }
}

fn normalize(value: f64, ceiling: f64) -> f64 {
    f64::min(value / ceiling * 100.0, 100.0)
}

/// Score in `0..=100`, rounded half up.
pub fn calculate_fun_score(inputs: &FunScoreInputs) -> u8 {
    let score = normalize(inputs.curve_count as f64, CURVES_CEILING) * CURVES_WEIGHT
        + normalize(inputs.elevation_gain_m, ELEVATION_GAIN_CEILING_M) * ELEVATION_GAIN_WEIGHT
        + normalize(inputs.elevation_loss_m, ELEVATION_LOSS_CEILING_M) * ELEVATION_LOSS_WEIGHT
        + normalize(inputs.max_elevation_m, MAX_ELEVATION_CEILING_M) * MAX_ELEVATION_WEIGHT;

    (score + 0.5).floor().clamp(0.0, 100.0) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Rating {
    Casual,
    Fun,
    Exciting,
    Thrilling,
    Epic,
}

impl Rating {
    pub fn from_score(score: u8) -> Self {
        match score {
            90..=u8::MAX => Self::Epic,
            75..=89 => Self::Thrilling,
            60..=74 => Self::Exciting,
            45..=59 => Self::Fun,
            _ => Self::Casual,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Epic => "Epic",
            Self::Thrilling => "Thrilling",
            Self::Exciting => "Exciting",
            Self::Fun => "Fun",
            Self::Casual => "Casual",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Epic => "Exceptional driving experience",
            Self::Thrilling => "Highly engaging route",
            Self::Exciting => "Very enjoyable drive",
            Self::Fun => "Good driving experience",
            Self::Casual => "Relaxed driving experience",
        }
    }

    /// Two-stop badge gradient.
    pub fn gradient(&self) -> (&'static str, &'static str) {
        match self {
            Self::Epic => ("purple-500", "pink-500"),
            Self::Thrilling => ("red-500", "orange-500"),
            Self::Exciting => ("lime-500", "green-500"),
            Self::Fun => ("cyan-500", "blue-500"),
            Self::Casual => ("gray-500", "slate-500"),
        }
    }

    /// Gradient as a `"from-X to-Y"` class token.
    pub fn color(&self) -> String {
        let (from, to) = self.gradient();
        format!("from-{from} to-{to}")
    }
}

impl Serialize for Rating {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Rating", 3)?;
        s.serialize_field("label", self.label())?;
        s.serialize_field("description", self.description())?;
        s.serialize_field("color", &self.color())?;
        s.end()
    }
}
