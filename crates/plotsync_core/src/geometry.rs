//! GeoJSON geometries.

use serde::{Deserialize, Serialize};

/// A GeoJSON position: `[longitude, latitude]` with optional altitude.
pub type Position = Vec<f64>;

/// Any GeoJSON geometry an annotation may carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    /// Single position.
    Point {
        /// Coordinates.
        coordinates: Position,
    },
    /// Several positions.
    MultiPoint {
        /// Coordinates.
        coordinates: Vec<Position>,
    },
    /// Connected line.
    LineString {
        /// Coordinates.
        coordinates: Vec<Position>,
    },
    /// Several lines.
    MultiLineString {
        /// Coordinates.
        coordinates: Vec<Vec<Position>>,
    },
    /// Polygon with optional holes.
    Polygon {
        /// Rings; the first is the exterior.
        coordinates: Vec<Vec<Position>>,
    },
    /// Several polygons.
    MultiPolygon {
        /// Polygons.
        coordinates: Vec<Vec<Vec<Position>>>,
    },
}

impl Geometry {
    /// GeoJSON type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point { .. } => "Point",
            Geometry::MultiPoint { .. } => "MultiPoint",
            Geometry::LineString { .. } => "LineString",
            Geometry::MultiLineString { .. } => "MultiLineString",
            Geometry::Polygon { .. } => "Polygon",
            Geometry::MultiPolygon { .. } => "MultiPolygon",
        }
    }

    /// All positions in document order.
    pub fn positions(&self) -> Vec<&Position> {
        match self {
            Geometry::Point { coordinates } => vec![coordinates],
            Geometry::MultiPoint { coordinates } | Geometry::LineString { coordinates } => {
                coordinates.iter().collect()
            }
            Geometry::MultiLineString { coordinates } | Geometry::Polygon { coordinates } => {
                coordinates.iter().flatten().collect()
            }
            Geometry::MultiPolygon { coordinates } => coordinates.iter().flatten().flatten().collect(),
        }
    }
}

/// Geometry of a track: one line, or several sub-lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TrackGeometry {
    /// A single line.
    LineString {
        /// Coordinates.
        coordinates: Vec<Position>,
    },
    /// A track broken into several legs.
    MultiLineString {
        /// Coordinates, one array per leg.
        coordinates: Vec<Vec<Position>>,
    },
}

impl TrackGeometry {
    /// Total number of positions, summed across sub-lines.
    pub fn coordinate_count(&self) -> usize {
        match self {
            TrackGeometry::LineString { coordinates } => coordinates.len(),
            TrackGeometry::MultiLineString { coordinates } => {
                coordinates.iter().map(Vec::len).sum()
            }
        }
    }

    /// All positions in document order.
    pub fn positions(&self) -> Vec<&Position> {
        match self {
            TrackGeometry::LineString { coordinates } => coordinates.iter().collect(),
            TrackGeometry::MultiLineString { coordinates } => {
                coordinates.iter().flatten().collect()
            }
        }
    }

    /// GeoJSON type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            TrackGeometry::LineString { .. } => "LineString",
            TrackGeometry::MultiLineString { .. } => "MultiLineString",
        }
    }
}

/// Geometry of a reference point.
///
/// The `type` tag is written on serialization; the parser checks it on
/// the way in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Point")]
pub struct PointGeometry {
    /// Coordinates.
    pub coordinates: Position,
}

impl PointGeometry {
    /// Creates a point at the given longitude and latitude.
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            coordinates: vec![longitude, latitude],
        }
    }
}
