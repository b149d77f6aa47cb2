//! Label store backed by files exported from the labeling database.
//!
//! The directory holds:
//! - `configuration.csv` with `key,value`
//! - `master_grid.csv` with `name,x,y,date`
//! - `user_maps.geojson`, features carrying `name` and `assignment_id`
//! - `qaqcfields.geojson`, features carrying `name` (optional)

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::LabelStore;
use crate::csv::Table;
use crate::error::{Error, Result};
use crate::geometry::{Crs, LabelFeature, LabelLayer};
use crate::model::{ConfigEntry, SitePoint};

pub const CONFIGURATION_FILE: &str = "configuration.csv";
pub const MASTER_GRID_FILE: &str = "master_grid.csv";
pub const USER_MAPS_FILE: &str = "user_maps.geojson";
pub const QAQC_FILE: &str = "qaqcfields.geojson";

/// A feature together with the properties used to look it up.
#[derive(Debug, Clone)]
struct KeyedFeature {
    name: String,
    assignment_id: Option<String>,
    feature: LabelFeature,
}

#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    config: Vec<ConfigEntry>,
    points: Vec<SitePoint>,
    user_maps: Vec<KeyedFeature>,
    qaqc: Vec<KeyedFeature>,
}

impl LocalStore {
    /// Read every table under `root` into memory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        let config = read_config(&root.join(CONFIGURATION_FILE))?;
        let points = read_master_grid(&root.join(MASTER_GRID_FILE))?;
        let user_maps = read_features(&root.join(USER_MAPS_FILE))?;
        let qaqc_path = root.join(QAQC_FILE);
        let qaqc = if qaqc_path.is_file() {
            read_features(&qaqc_path)?
        } else {
            Vec::new()
        };

        info!(
            "Opened local store {:?}: {} sites, {} user polygons, {} expert polygons",
            root,
            points.len(),
            user_maps.len(),
            qaqc.len()
        );

        Ok(Self {
            root,
            config,
            points,
            user_maps,
            qaqc,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl LabelStore for LocalStore {
    async fn instance_config(&self) -> Result<Vec<ConfigEntry>> {
        Ok(self
            .config
            .iter()
            .filter(|e| e.key.starts_with("instance"))
            .cloned()
            .collect())
    }

    async fn site_point(&self, name: &str) -> Result<Option<SitePoint>> {
        Ok(self.points.iter().find(|p| p.name == name).cloned())
    }

    async fn user_labels(&self, assignment_id: &str) -> Result<Option<LabelLayer>> {
        let features = self
            .user_maps
            .iter()
            .filter(|f| f.assignment_id.as_deref() == Some(assignment_id))
            .map(|f| f.feature.clone())
            .collect();
        Ok(LabelLayer::from_features(features, Crs::WGS84))
    }

    async fn expert_labels(&self, name: &str) -> Result<Option<LabelLayer>> {
        let features = self
            .qaqc
            .iter()
            .filter(|f| f.name == name)
            .map(|f| f.feature.clone())
            .collect();
        Ok(LabelLayer::from_features(features, Crs::WGS84))
    }
}

fn csv_table(path: &Path) -> Result<Table> {
    let text = fs::read_to_string(path)?;
    Table::parse(&text).map_err(|message| csv_error(path, message))
}

fn csv_error(path: &Path, message: String) -> Error {
    Error::Csv {
        path: path.display().to_string(),
        message,
    }
}

fn read_config(path: &Path) -> Result<Vec<ConfigEntry>> {
    let table = csv_table(path)?;
    let cols = table
        .columns(&["key", "value"])
        .map_err(|m| csv_error(path, m))?;

    Ok(table
        .rows
        .iter()
        .map(|row| ConfigEntry {
            key: Table::field(row, cols[0]).trim().to_string(),
            value: Table::field(row, cols[1]).trim().to_string(),
        })
        .collect())
}

fn read_master_grid(path: &Path) -> Result<Vec<SitePoint>> {
    let table = csv_table(path)?;
    let cols = table
        .columns(&["name", "x", "y", "date"])
        .map_err(|m| csv_error(path, m))?;

    table
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let coord = |col: usize, label: &str| -> Result<f64> {
                let raw = Table::field(row, col).trim();
                raw.parse::<f64>().map_err(|_| {
                    csv_error(path, format!("row {}: invalid {label} '{raw}'", i + 1))
                })
            };
            Ok(SitePoint {
                name: Table::field(row, cols[0]).trim().to_string(),
                x: coord(cols[1], "x")?,
                y: coord(cols[2], "y")?,
                date: Table::field(row, cols[3]).trim().to_string(),
            })
        })
        .collect()
}

fn read_features(path: &Path) -> Result<Vec<KeyedFeature>> {
    let text = fs::read_to_string(path)?;
    let collection: Value = serde_json::from_str(&text)?;

    let features = collection
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            Error::InvalidGeometry(format!("{}: not a FeatureCollection", path.display()))
        })?;

    let mut keyed = Vec::with_capacity(features.len());
    for feature in features {
        let properties = feature.get("properties").unwrap_or(&Value::Null);
        let name = property_string(properties, "name").unwrap_or_default();
        let assignment_id = property_string(properties, "assignment_id");

        // Null geometries carry nothing to draw.
        let geometry = match feature.get("geometry") {
            Some(Value::Null) | None => {
                debug!("Skipping feature without geometry for {}", name);
                continue;
            }
            Some(geometry) => geometry.clone(),
        };

        keyed.push(KeyedFeature {
            feature: LabelFeature::new(name.clone(), geometry)?,
            name,
            assignment_id,
        });
    }
    Ok(keyed)
}

/// Strings and numbers both become strings; ids are often exported as integers.
fn property_string(properties: &Value, key: &str) -> Option<String> {
    match properties.get(key)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
