pub mod analysis;
pub mod converter;
pub mod curvature;
pub mod error;
pub mod fun_score;
pub mod geo_math;
#[cfg(feature = "geocoding")]
pub mod geocoding;
pub mod gpx_types;
pub mod options;
pub mod parser;
pub mod scenic;
pub mod stats;
pub mod track;

use wasm_bindgen::prelude::*;

pub use crate::analysis::{RouteAnalysis, analyze_gpx, analyze_track};
pub use crate::error::{ComputationError, ParseError, RouteError};
pub use crate::fun_score::{FunScoreInputs, Rating, calculate_fun_score};
pub use crate::options::{AnalysisOptions, CurveDetection, EmptySectionPolicy};
pub use crate::parser::{ParsedTrack, parse_track, parse_track_bytes, parse_track_reader};
pub use crate::scenic::ScenicSpot;
pub use crate::stats::{Checkpoint, ElevationSample, RouteProfile, RouteStats};
pub use crate::track::{BoundingBox, GeoPoint, Track};

/// Analyze a GPX string, returned as a JS object.
#[wasm_bindgen(js_name = analyzeGpx)]
pub fn analyze_gpx_js(gpx_string: &str, options: JsValue) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let opts = parse_options(options)?;
    let analysis = analyze_gpx(gpx_string, &opts)?;
    serde_wasm_bindgen::to_value(&analysis).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Analyze a GPX string, returned as a JSON string.
#[wasm_bindgen(js_name = analyzeGpxString)]
pub fn analyze_gpx_string(gpx_string: &str, options: JsValue) -> Result<String, JsValue> {
    console_error_panic_hook::set_once();

    let opts = parse_options(options)?;
    let analysis = analyze_gpx(gpx_string, &opts)?;
    serde_json::to_string(&analysis).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Badge (label, description, color) for a fun score.
#[wasm_bindgen(js_name = funScoreRating)]
pub fn fun_score_rating(score: u8) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(&Rating::from_score(score))
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

fn parse_options(options: JsValue) -> Result<AnalysisOptions, JsValue> {
    if options.is_undefined() || options.is_null() {
        Ok(AnalysisOptions::default())
    } else {
        serde_wasm_bindgen::from_value(options).map_err(|e| JsValue::from_str(&e.to_string()))
    }
}
