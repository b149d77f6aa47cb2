//! Sentinel Hub WMS layers scoped to a site's capture date and footprint.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{ConfigEntry, SiteLabels};

pub const DEFAULT_WMS_BASE_URL: &str = "https://services.sentinel-hub.com/ogc/wms";

pub const TRUE_COLOR: &str = "TRUE-COLOR";
pub const FALSE_COLOR: &str = "FALSE-COLOR";

/// Instance id of the first entry whose key contains `kind`.
pub fn resolve_instance<'a>(config: &'a [ConfigEntry], kind: &str) -> Result<&'a str> {
    config
        .iter()
        .find(|e| e.key.contains(kind))
        .map(|e| e.value.as_str())
        .ok_or_else(|| Error::MissingInstance(kind.to_string()))
}

pub fn wms_url(base_url: &str, instance: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), instance)
}

/// One WMS overlay, with the extra request parameters Sentinel Hub accepts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WmsLayer {
    pub name: String,
    pub url: String,
    pub layers: String,
    pub format: String,
    pub transparent: bool,
    pub crs: String,
    /// `start/end` date range.
    pub time: String,
    /// WKT of the area to render.
    pub geometry: String,
    pub maxcc: String,
}

/// The true- and false-color layers for a site.
pub fn site_layers(labels: &SiteLabels, url: &str, maxcc: u8) -> [WmsLayer; 2] {
    let date = &labels.point.date;
    let geometry = labels.image_grid.to_wkt();

    [TRUE_COLOR, FALSE_COLOR].map(|layer| WmsLayer {
        name: layer.to_string(),
        url: url.to_string(),
        layers: layer.to_string(),
        format: "image/png".to_string(),
        transparent: true,
        crs: labels.image_grid.crs.to_string(),
        time: format!("{date}/{date}"),
        geometry: geometry.clone(),
        maxcc: maxcc.to_string(),
    })
}
