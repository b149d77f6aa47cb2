//! Grid cells around site points and label polygons read from the store.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use crate::error::{Error, Result};
use crate::model::SitePoint;

/// Half-width of the sampling footprint, in degrees.
pub const DEFAULT_HALF_WIDTH: f64 = 0.005 / 2.0;

/// Ratio of the imagery-fetch footprint to the sampling footprint.
pub const IMAGE_SCALE: f64 = 2.56;

/// Name of the geometry column in the label tables.
pub const GEOMETRY_COLUMN: &str = "geom_clean";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Crs {
    pub epsg: u32,
}

impl Crs {
    pub const WGS84: Crs = Crs { epsg: 4326 };
}

impl Default for Crs {
    fn default() -> Self {
        Self::WGS84
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
}

impl Bounds {
    pub fn around(x: f64, y: f64, w: f64) -> Self {
        Self {
            minx: x - w,
            miny: y - w,
            maxx: x + w,
            maxy: y + w,
        }
    }

    /// Leaflet-style `[[south, west], [north, east]]`.
    pub fn to_lat_lng_bounds(&self) -> [[f64; 2]; 2] {
        [[self.miny, self.minx], [self.maxy, self.maxx]]
    }

    /// Closed counter-clockwise ring starting at the lower-right corner.
    fn ring(&self) -> [[f64; 2]; 5] {
        [
            [self.maxx, self.miny],
            [self.maxx, self.maxy],
            [self.minx, self.maxy],
            [self.minx, self.miny],
            [self.maxx, self.miny],
        ]
    }
}

/// Square polygon centred on a site point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub half_width: f64,
    pub bounds: Bounds,
    pub crs: Crs,
}

impl GridCell {
    pub fn new(point: &SitePoint, w: f64, crs: Crs) -> Self {
        Self {
            name: point.name.clone(),
            x: point.x,
            y: point.y,
            half_width: w,
            bounds: Bounds::around(point.x, point.y, w),
            crs,
        }
    }

    pub fn to_wkt(&self) -> String {
        let coords = self
            .bounds
            .ring()
            .iter()
            .map(|[x, y]| format!("{x} {y}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("POLYGON (({coords}))")
    }

    pub fn to_feature(&self) -> Value {
        json!({
            "type": "Feature",
            "properties": { "name": self.name },
            "geometry": {
                "type": "Polygon",
                "coordinates": [self.bounds.ring()],
            },
        })
    }
}

/// Buffers every point into a square cell of half-width `w`.
pub fn points_to_gridpoly(points: &[SitePoint], w: f64, crs: Crs) -> Vec<GridCell> {
    points.iter().map(|p| GridCell::new(p, w, crs)).collect()
}

/// Sampling and imagery-fetch cells for a site.
pub fn site_cells(point: &SitePoint, w: f64) -> (GridCell, GridCell) {
    (
        GridCell::new(point, w, Crs::WGS84),
        GridCell::new(point, w * IMAGE_SCALE, Crs::WGS84),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelFeature {
    pub name: String,
    /// GeoJSON `Polygon` or `MultiPolygon`.
    pub geometry: Value,
}

impl LabelFeature {
    pub fn new(name: impl Into<String>, geometry: Value) -> Result<Self> {
        validate_polygonal(&geometry)?;
        Ok(Self {
            name: name.into(),
            geometry,
        })
    }

    /// Parses the output of `ST_AsGeoJSON`.
    pub fn from_geojson_str(name: impl Into<String>, geojson: &str) -> Result<Self> {
        let geometry: Value = serde_json::from_str(geojson)?;
        Self::new(name, geometry)
    }
}

/// A set of label polygons sharing one CRS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelLayer {
    pub crs: Crs,
    pub features: Vec<LabelFeature>,
}

impl LabelLayer {
    /// `None` when there are no features, so callers can tell "no data"
    /// apart from a layer that was fetched.
    pub fn from_features(features: Vec<LabelFeature>, crs: Crs) -> Option<Self> {
        if features.is_empty() {
            None
        } else {
            Some(Self { crs, features })
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn to_feature_collection(&self) -> Value {
        let features: Vec<Value> = self
            .features
            .iter()
            .map(|f| {
                json!({
                    "type": "Feature",
                    "properties": { "name": f.name },
                    "geometry": f.geometry,
                })
            })
            .collect();
        json!({ "type": "FeatureCollection", "features": features })
    }
}

fn validate_polygonal(geometry: &Value) -> Result<()> {
    let kind = geometry
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidGeometry("missing geometry type".to_string()))?;

    let depth = match kind {
        "Polygon" => 3,
        "MultiPolygon" => 4,
        other => {
            return Err(Error::InvalidGeometry(format!(
                "expected Polygon or MultiPolygon, got {other}"
            )))
        }
    };

    let coordinates = geometry
        .get("coordinates")
        .ok_or_else(|| Error::InvalidGeometry(format!("{kind} without coordinates")))?;

    if nesting_depth(coordinates) != depth {
        return Err(Error::InvalidGeometry(format!(
            "{kind} coordinates are not nested {depth} levels deep"
        )));
    }
    Ok(())
}

// Depth of the first-element path; an empty array counts as one level.
fn nesting_depth(value: &Value) -> usize {
    match value {
        Value::Array(items) => match items.first() {
            Some(first) => 1 + nesting_depth(first),
            None => 1,
        },
        Value::Number(_) => 0,
        _ => usize::MAX / 2,
    }
}
