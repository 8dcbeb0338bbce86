use wasm_bindgen::JsValue;

/// Failure to turn a document into a track.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid GPX file format")]
    InvalidFormat,

    #[error("Invalid GPX file format: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("GPX document is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("Could not read GPX document: {0}")]
    Io(#[from] std::io::Error),

    #[error("No track data found in GPX file")]
    NoTrackData,

    #[error("Invalid track data in GPX file")]
    InvalidTrackData,

    #[error("No coordinates found in GPX file")]
    NoCoordinates,
}

impl From<quick_xml::events::attributes::AttrError> for ParseError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        Self::Xml(e.into())
    }
}

/// Numeric input the pipeline cannot work with.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ComputationError {
    #[error("Track contains no points")]
    EmptyTrack,

    #[error("Invalid coordinate at point {index}: lat={lat}, lon={lon}")]
    InvalidCoordinate { index: usize, lat: f64, lon: f64 },

    #[error("No elevation samples in scenic section {ranking}")]
    EmptyScenicSection { ranking: u8 },

    #[error("Invalid option {option}: {value}")]
    InvalidOption { option: &'static str, value: f64 },
}

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("Failed to parse GPX file: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Computation(#[from] ComputationError),
}

impl From<RouteError> for JsValue {
    fn from(e: RouteError) -> Self {
        JsValue::from_str(&e.to_string())
    }
}
