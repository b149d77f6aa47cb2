//! Retrieval of a labeler's work on one site and assembly of its map.

use rand::Rng;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::assignments::{select_site, SiteSelector};
use crate::config::ReviewConfig;
use crate::error::{Error, Result};
use crate::geometry::site_cells;
use crate::imagery::wms::{self, WmsLayer};
use crate::map::MapDocument;
use crate::model::{Assignment, ConfigEntry, SiteLabels, QA_KIND};
use crate::review::ReviewLog;
use crate::store::LabelStore;

/// What to fetch for a review.
#[derive(Debug, Clone)]
pub struct LabelRequest<'a> {
    pub rater: &'a str,
    /// Assignment type code.
    pub kind: &'a str,
    pub site: SiteSelector,
}

impl<'a> LabelRequest<'a> {
    /// A random QA site for `rater`.
    pub fn new(rater: &'a str) -> Self {
        Self {
            rater,
            kind: QA_KIND,
            site: SiteSelector::Random,
        }
    }

    pub fn kind(mut self, kind: &'a str) -> Self {
        self.kind = kind;
        self
    }

    pub fn site(mut self, site: SiteSelector) -> Self {
        self.site = site;
        self
    }
}

pub struct LabelReview<S> {
    store: S,
    settings: ReviewConfig,
    instances: Vec<ConfigEntry>,
}

impl<S: LabelStore> LabelReview<S> {
    /// Loads the imagery instance table once up front.
    pub async fn new(store: S, settings: ReviewConfig) -> Result<Self> {
        let instances = store.instance_config().await?;
        debug!("{} imagery instances configured", instances.len());
        Ok(Self {
            store,
            settings,
            instances,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &ReviewConfig {
        &self.settings
    }

    /// Select a site and gather its point, grid cells and label layers.
    pub async fn get_labels<R: Rng + ?Sized>(
        &self,
        assignments: &[Assignment],
        request: &LabelRequest<'_>,
        log: &ReviewLog,
        rng: &mut R,
    ) -> Result<SiteLabels> {
        let reviewed = match request.site {
            SiteSelector::Random => log.reviewed_sites(request.rater)?,
            SiteSelector::Named(_) => HashSet::new(),
        };
        let site = select_site(
            assignments,
            request.rater,
            request.kind,
            &request.site,
            &reviewed,
            rng,
        )?;
        info!(
            "Reviewing {} (assignment {}) for rater {}",
            site.name, site.assignment_id, request.rater
        );

        let point = self
            .store
            .site_point(&site.name)
            .await?
            .ok_or_else(|| Error::SiteNotFound(format!("{} in master_grid", site.name)))?;
        let (grid, image_grid) = site_cells(&point, self.settings.grid_half_width);

        let user = self.store.user_labels(&site.assignment_id).await?;
        let expert = if request.kind == QA_KIND {
            self.store.expert_labels(&site.name).await?
        } else {
            None
        };
        debug!(
            "{}: {} user polygons, {} expert polygons",
            site.name,
            user.as_ref().map_or(0, |l| l.len()),
            expert.as_ref().map_or(0, |l| l.len())
        );

        Ok(SiteLabels {
            rater: request.rater.to_string(),
            kind: request.kind.to_string(),
            assignment_id: site.assignment_id.clone(),
            point,
            grid,
            image_grid,
            user,
            expert,
        })
    }

    pub fn wms_url(&self, labels: &SiteLabels) -> Result<String> {
        let instance = wms::resolve_instance(&self.instances, &labels.kind)?;
        Ok(wms::wms_url(&self.settings.wms_base_url, instance))
    }

    pub fn wms_layers(&self, labels: &SiteLabels) -> Result<[WmsLayer; 2]> {
        let url = self.wms_url(labels)?;
        Ok(wms::site_layers(labels, &url, self.settings.maxcc))
    }

    /// Map with the site's labels over the true- and false-color WMS layers.
    pub fn plot_labels(&self, labels: &SiteLabels) -> Result<MapDocument> {
        let mut map = MapDocument::for_site(labels);
        map.add_wms_layers(self.wms_layers(labels)?);
        Ok(map)
    }
}

#[cfg(feature = "local-tiles")]
pub use local_tiles::plot_labels_local;

#[cfg(feature = "local-tiles")]
mod local_tiles {
    use std::fs;
    use std::path::Path;

    use crate::error::Result;
    use crate::imagery::raster::LocalRaster;
    use crate::imagery::{BandTriplet, StretchMode};
    use crate::map::{MapDocument, Overlay};
    use crate::model::SiteLabels;

    /// Map with the site's labels over two stretched composites of a local
    /// raster. The PNGs are written to `output_dir` next to the map.
    pub fn plot_labels_local(
        labels: &SiteLabels,
        raster_path: &Path,
        output_dir: &Path,
        composites: [BandTriplet; 2],
        mode: StretchMode,
    ) -> Result<MapDocument> {
        fs::create_dir_all(output_dir)?;
        let raster = LocalRaster::open(raster_path)?;
        let mut map = MapDocument::for_site(labels);

        for (name, bands) in ["true color", "false color"].into_iter().zip(composites) {
            let file_name = format!("{}_{}.png", labels.name(), name.replace(' ', "_"));
            let tile = raster.render(name, bands, mode, &output_dir.join(&file_name))?;
            map.add_overlay(Overlay::image(name, file_name, &tile.bounds));
        }
        Ok(map)
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::geometry::{site_cells, DEFAULT_HALF_WIDTH};
        use crate::model::SitePoint;
        use gdal::raster::Buffer;
        use gdal::DriverManager;
        use tempfile::TempDir;

        // 4-band 20x10 raster covering lon -1.51..-1.49, lat 6.24..6.25.
        fn write_tile(path: &Path) {
            let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
            let mut dataset = driver
                .create_with_band_type::<u16, _>(path, 20, 10, 4)
                .unwrap();
            dataset
                .set_geo_transform(&[-1.51, 0.001, 0.0, 6.25, 0.0, -0.001])
                .unwrap();
            for n in 1..=4 {
                let mut band = dataset.rasterband(n).unwrap();
                let values: Vec<u16> = (0..200).map(|i| (n * 1000 + i) as u16).collect();
                let mut buffer = Buffer::new((20, 10), values);
                band.write((0, 0), (20, 10), &mut buffer).unwrap();
            }
        }

        fn labels() -> SiteLabels {
            let point = SitePoint {
                name: "GH0001".to_string(),
                x: -1.5,
                y: 6.245,
                date: "2018-01-15".to_string(),
            };
            let (grid, image_grid) = site_cells(&point, DEFAULT_HALF_WIDTH);
            SiteLabels {
                rater: "7".to_string(),
                kind: "Q".to_string(),
                assignment_id: "101".to_string(),
                point,
                grid,
                image_grid,
                user: None,
                expert: None,
            }
        }

        #[test]
        fn test_plot_labels_local_writes_two_overlays() {
            if DriverManager::get_driver_by_name("GTiff").is_err() {
                eprintln!("Skipping test: GTiff driver not available");
                return;
            }
            let dir = TempDir::new().unwrap();
            let tile = dir.path().join("tile.tif");
            write_tile(&tile);
            let output_dir = dir.path().join("maps");

            let map = plot_labels_local(
                &labels(),
                &tile,
                &output_dir,
                [BandTriplet::TRUE_COLOR, BandTriplet::FALSE_COLOR],
                StretchMode::default(),
            )
            .unwrap();

            let images: Vec<_> = map
                .overlays
                .iter()
                .filter_map(|o| match o {
                    Overlay::Image { name, url, bounds } => Some((name, url, bounds)),
                    _ => None,
                })
                .collect();
            assert_eq!(images.len(), 2);
            assert_eq!(images[0].0, "true color");
            assert_eq!(images[1].0, "false color");
            assert_eq!(images[0].1, "GH0001_true_color.png");
            assert_eq!(images[1].1, "GH0001_false_color.png");

            for (_, url, bounds) in &images {
                assert!(output_dir.join(url.as_str()).is_file());
                let [[south, west], [north, east]] = **bounds;
                assert!((south - 6.24).abs() < 1e-9);
                assert!((west + 1.51).abs() < 1e-9);
                assert!((north - 6.25).abs() < 1e-9);
                assert!((east + 1.49).abs() < 1e-9);
            }

            // Grid first, imagery after, drawn beneath the outlines.
            assert_eq!(map.overlays[0].name(), "GH0001");
            let html = map.to_html().unwrap();
            assert!(html.contains(r#"{ pane: "imagery" }"#));
        }
    }
}
