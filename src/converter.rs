use geojson::{Feature, FeatureCollection, Geometry, Value};
use serde_json::{Map, Value as JsonValue};

use crate::error::ParseError;
use crate::gpx_types::*;
use crate::track::GeoPoint;

/// The line geometry of the first feature in a document.
#[derive(Debug, Clone)]
pub struct PrimaryLine {
    pub name: Option<String>,
    pub points: Vec<GeoPoint>,
}

/// Convert parsed GPX data to a GeoJSON FeatureCollection.
///
/// Features are emitted tracks first, then routes, then waypoints. Segments
/// and routes with fewer than two points cannot form a line and are dropped.
pub fn to_feature_collection(data: &GpxData, join_track_segments: bool) -> FeatureCollection {
    let mut features = Vec::new();

    for trk in &data.tracks {
        features.extend(track_to_features(trk, join_track_segments));
    }

    for rte in &data.routes {
        if rte.points.len() >= 2 {
            features.push(line_feature(&rte.points, "route", &rte.name));
        }
    }

    for wpt in &data.waypoints {
        let geometry = Geometry::new(Value::Point(point_coords(wpt)));
        features.push(feature(geometry, props("waypoint", &None)));
    }

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn track_to_features(trk: &GpxTrack, join_track_segments: bool) -> Vec<Feature> {
    let lines: Vec<&GpxSegment> = trk.segments.iter().filter(|s| s.points.len() >= 2).collect();

    match lines.as_slice() {
        [] => Vec::new(),
        [seg] => vec![line_feature(&seg.points, "track", &trk.name)],
        _ if join_track_segments => {
            let line_strings: Vec<Vec<Vec<f64>>> = lines
                .iter()
                .map(|seg| seg.points.iter().map(point_coords).collect())
                .collect();
            let geometry = Geometry::new(Value::MultiLineString(line_strings));
            vec![feature(geometry, props("track", &trk.name))]
        }
        _ => lines
            .iter()
            .map(|seg| line_feature(&seg.points, "track", &trk.name))
            .collect(),
    }
}

fn line_feature(points: &[GpxPoint], gpx_type: &str, name: &Option<String>) -> Feature {
    let coords: Vec<Vec<f64>> = points.iter().map(point_coords).collect();
    feature(Geometry::new(Value::LineString(coords)), props(gpx_type, name))
}

fn feature(geometry: Geometry, properties: Map<String, JsonValue>) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn props(gpx_type: &str, name: &Option<String>) -> Map<String, JsonValue> {
    let mut props = Map::new();
    props.insert(
        "gpxType".to_string(),
        JsonValue::String(gpx_type.to_string()),
    );
    if let Some(name) = name {
        props.insert("name".to_string(), JsonValue::String(name.clone()));
    }
    props
}

/// Build [lon, lat] or [lon, lat, ele] coordinate array.
fn point_coords(pt: &GpxPoint) -> Vec<f64> {
    match pt.ele {
        Some(ele) => vec![pt.lon, pt.lat, ele],
        None => vec![pt.lon, pt.lat],
    }
}

/// Pick the first feature of the collection and read it back as a line.
///
/// `declared_lines` tells whether the document had any `<trk>` or `<rte>`
/// element, so an empty collection can be reported as missing coordinates
/// rather than missing track data.
pub fn primary_line(
    fc: &FeatureCollection,
    declared_lines: bool,
) -> Result<PrimaryLine, ParseError> {
    let Some(first) = fc.features.first() else {
        return Err(if declared_lines {
            ParseError::NoCoordinates
        } else {
            ParseError::NoTrackData
        });
    };

    let coords = match first.geometry.as_ref().map(|g| &g.value) {
        Some(Value::LineString(coords)) => coords,
        _ => return Err(ParseError::InvalidTrackData),
    };

    let points = coords
        .iter()
        .map(|c| match c.as_slice() {
            [lon, lat] => Ok(GeoPoint::new(*lat, *lon, None)),
            [lon, lat, ele, ..] => Ok(GeoPoint::new(*lat, *lon, Some(*ele))),
            _ => Err(ParseError::InvalidTrackData),
        })
        .collect::<Result<Vec<_>, _>>()?;

    if points.is_empty() {
        return Err(ParseError::NoCoordinates);
    }

    let name = first
        .properties
        .as_ref()
        .and_then(|p| p.get("name"))
        .and_then(JsonValue::as_str)
        .map(str::to_string);

    Ok(PrimaryLine { name, points })
}
