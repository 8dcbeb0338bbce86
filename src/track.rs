use serde::{Serialize, Serializer};

use crate::error::ComputationError;

/// A geographic position in WGS84 degrees with optional elevation in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
    pub elevation: Option<f64>,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64, elevation: Option<f64>) -> Self {
        Self {
            lat,
            lon,
            elevation: elevation.filter(|e| e.is_finite()),
        }
    }

    /// Elevation used by the aggregates; absent elevation counts as sea level.
    pub fn elevation_or_zero(&self) -> f64 {
        self.elevation.unwrap_or(0.0)
    }

    /// `[lat, lon]` pair as consumed by map layers.
    pub fn lat_lon(&self) -> [f64; 2] {
        [self.lat, self.lon]
    }

    fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// An ordered, non-empty sequence of validated points.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    points: Vec<GeoPoint>,
}

impl Track {
    pub fn new(points: Vec<GeoPoint>) -> Result<Self, ComputationError> {
        if points.is_empty() {
            return Err(ComputationError::EmptyTrack);
        }
        if let Some((index, p)) = points.iter().enumerate().find(|(_, p)| !p.is_valid()) {
            return Err(ComputationError::InvalidCoordinate {
                index,
                lat: p.lat,
                lon: p.lon,
            });
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of points that carried no elevation in the source document.
    pub fn missing_elevations(&self) -> usize {
        self.points.iter().filter(|p| p.elevation.is_none()).count()
    }

    pub fn coordinates(&self) -> Vec<[f64; 2]> {
        self.points.iter().map(GeoPoint::lat_lon).collect()
    }

    /// Recomputed from every point on each call.
    pub fn bounds(&self) -> BoundingBox {
        let first = self.points[0];
        let init = BoundingBox {
            min_lat: first.lat,
            min_lon: first.lon,
            max_lat: first.lat,
            max_lon: first.lon,
        };
        self.points.iter().fold(init, |b, p| BoundingBox {
            min_lat: b.min_lat.min(p.lat),
            min_lon: b.min_lon.min(p.lon),
            max_lat: b.max_lat.max(p.lat),
            max_lon: b.max_lon.max(p.lon),
        })
    }
}

/// South-west and north-east corners of a track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// `[[minLat, minLon], [maxLat, maxLon]]`
    pub fn corners(&self) -> [[f64; 2]; 2] {
        [[self.min_lat, self.min_lon], [self.max_lat, self.max_lon]]
    }
}

impl Serialize for BoundingBox {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.corners().serialize(serializer)
    }
}
