//! Standalone Leaflet map of a site, its labels and the imagery beneath.

use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::Result;
use crate::geometry::Bounds;
use crate::imagery::WmsLayer;
use crate::model::SiteLabels;

pub const DEFAULT_ZOOM: u8 = 16;

const SATELLITE_URL: &str = "https://mt1.google.com/vt/lyrs=s&x={x}&y={y}&z={z}";
const SATELLITE_ATTRIBUTION: &str = "Google";

pub const GRID_COLOR: &str = "white";
pub const USER_COLOR: &str = "red";
pub const EXPERT_COLOR: &str = "#3388ff";

pub const USER_LAYER: &str = "User labels";
pub const EXPERT_LAYER: &str = "Expert labels";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Basemap {
    pub name: String,
    pub url: String,
    pub attribution: String,
}

impl Basemap {
    pub fn satellite() -> Self {
        Self {
            name: "SATELLITE".to_string(),
            url: SATELLITE_URL.to_string(),
            attribution: SATELLITE_ATTRIBUTION.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Overlay {
    GeoJson {
        name: String,
        color: String,
        data: Value,
    },
    Wms(WmsLayer),
    Image {
        name: String,
        /// Relative to the HTML document.
        url: String,
        /// `[[south, west], [north, east]]`
        bounds: [[f64; 2]; 2],
    },
}

impl Overlay {
    pub fn name(&self) -> &str {
        match self {
            Overlay::GeoJson { name, .. } | Overlay::Image { name, .. } => name,
            Overlay::Wms(layer) => &layer.name,
        }
    }

    pub fn image(name: impl Into<String>, url: impl Into<String>, bounds: &Bounds) -> Self {
        Overlay::Image {
            name: name.into(),
            url: url.into(),
            bounds: bounds.to_lat_lng_bounds(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MapDocument {
    pub title: String,
    /// `[lat, lon]`
    pub center: [f64; 2],
    pub zoom: u8,
    pub basemap: Basemap,
    pub overlays: Vec<Overlay>,
}

impl MapDocument {
    /// Basemap, grid cell and whichever label layers are present.
    pub fn for_site(labels: &SiteLabels) -> Self {
        let mut overlays = vec![Overlay::GeoJson {
            name: labels.name().to_string(),
            color: GRID_COLOR.to_string(),
            data: labels.grid.to_feature(),
        }];

        if let Some(user) = &labels.user {
            overlays.push(Overlay::GeoJson {
                name: USER_LAYER.to_string(),
                color: USER_COLOR.to_string(),
                data: user.to_feature_collection(),
            });
        }
        if let Some(expert) = &labels.expert {
            overlays.push(Overlay::GeoJson {
                name: EXPERT_LAYER.to_string(),
                color: EXPERT_COLOR.to_string(),
                data: expert.to_feature_collection(),
            });
        }

        Self {
            title: format!("{} - labeller {}", labels.name(), labels.rater),
            center: [labels.point.y, labels.point.x],
            zoom: DEFAULT_ZOOM,
            basemap: Basemap::satellite(),
            overlays,
        }
    }

    pub fn add_overlay(&mut self, overlay: Overlay) -> &mut Self {
        self.overlays.push(overlay);
        self
    }

    pub fn add_wms_layers(&mut self, layers: [WmsLayer; 2]) -> &mut Self {
        for layer in layers {
            self.add_overlay(Overlay::Wms(layer));
        }
        self
    }

    pub fn to_html(&self) -> Result<String> {
        // `</script>` inside a string would end the script element.
        let spec = serde_json::to_string(self)?.replace("</", "<\\/");
        Ok(HTML_TEMPLATE
            .replace("{{title}}", &html_escape(&self.title))
            .replace("{{spec}}", &spec))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_html()?)?;
        info!("Map with {} overlays written to {:?}", self.overlays.len(), path);
        Ok(())
    }
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{{title}}</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<style>html, body, #map { height: 100%; margin: 0; }</style>
</head>
<body>
<div id="map"></div>
<script>
const spec = {{spec}};
const map = L.map("map").setView(spec.center, spec.zoom);
// Image overlays share overlayPane (z-index 400) with the label outlines;
// give them their own pane underneath.
map.createPane("imagery").style.zIndex = 350;
const basemap = L.tileLayer(spec.basemap.url, {
  attribution: spec.basemap.attribution,
  maxZoom: 22,
}).addTo(map);
const overlays = {};
for (const o of spec.overlays) {
  let layer;
  if (o.kind === "geo_json") {
    layer = L.geoJSON(o.data, { style: { color: o.color, fill: false, weight: 2 } });
  } else if (o.kind === "wms") {
    layer = L.tileLayer.wms(o.url, {
      layers: o.layers,
      format: o.format,
      transparent: o.transparent,
      crs: L.CRS.EPSG4326,
      time: o.time,
      geometry: o.geometry,
      maxcc: o.maxcc,
    });
  } else if (o.kind === "image") {
    layer = L.imageOverlay(o.url, o.bounds, { pane: "imagery" });
  }
  if (layer) {
    layer.addTo(map);
    overlays[o.name] = layer;
  }
}
L.control.layers({ [spec.basemap.name]: basemap }, overlays).addTo(map);
</script>
</body>
</html>
"#;
