//! Local raster tiles read with GDAL.

use gdal::Dataset;
use std::path::{Path, PathBuf};
use tracing::info;

use super::stretch::{composite, stretch_bounds, Band, StretchBounds, StretchMode};
use super::BandTriplet;
use crate::error::{Error, Result};
use crate::geometry::Bounds;

pub struct LocalRaster {
    path: PathBuf,
    dataset: Dataset,
}

/// A stretched band composite written to disk, with its footprint.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTile {
    pub name: String,
    pub path: PathBuf,
    pub bounds: Bounds,
    pub stretch: StretchBounds,
}

impl LocalRaster {
    pub fn open(path: &Path) -> Result<Self> {
        let dataset = Dataset::open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            dataset,
        })
    }

    pub fn band_count(&self) -> usize {
        self.dataset.raster_count() as usize
    }

    /// `(cols, rows)`
    pub fn size(&self) -> (usize, usize) {
        self.dataset.raster_size()
    }

    /// Footprint from the geotransform; assumes a north-up raster.
    pub fn bounds(&self) -> Result<Bounds> {
        let gt = self.dataset.geo_transform()?;
        let (cols, rows) = self.size();
        let (x0, x1) = (gt[0], gt[0] + gt[1] * cols as f64);
        let (y0, y1) = (gt[3], gt[3] + gt[5] * rows as f64);
        Ok(Bounds {
            minx: x0.min(x1),
            miny: y0.min(y1),
            maxx: x0.max(x1),
            maxy: y0.max(y1),
        })
    }

    /// Read whole bands as `f64`.
    pub fn read_bands(&self, bands: &[usize]) -> Result<Vec<Band>> {
        let count = self.band_count();
        let (cols, rows) = self.size();

        bands
            .iter()
            .map(|&index| {
                if index == 0 || index > count {
                    return Err(Error::InvalidBands(format!(
                        "band {index} requested from {:?} with {count} bands",
                        self.path
                    )));
                }
                let band = self.dataset.rasterband(index)?;
                let buffer = band.read_as::<f64>((0, 0), (cols, rows), (cols, rows), None)?;
                Ok(Band {
                    index,
                    values: buffer.data().to_vec(),
                    nodata: band.no_data_value(),
                })
            })
            .collect()
    }

    pub fn stretch_bounds(&self, bands: &[usize], mode: StretchMode) -> Result<StretchBounds> {
        stretch_bounds(&self.read_bands(bands)?, mode)
    }

    /// Write `bands` as a stretched RGBA PNG at `output`.
    pub fn render(
        &self,
        name: &str,
        bands: BandTriplet,
        mode: StretchMode,
        output: &Path,
    ) -> Result<RenderedTile> {
        bands.validate(self.band_count())?;
        let (cols, rows) = self.size();

        let read = self.read_bands(&bands.bands())?;
        let stretch = stretch_bounds(&read, mode)?;
        let [r, g, b]: [Band; 3] = read
            .try_into()
            .map_err(|_| Error::InvalidBands(format!("expected three bands for {name}")))?;

        let image = composite(&[r, g, b], &stretch, cols, rows)?;
        image.save(output)?;
        info!("Rendered {} (bands {}) to {:?}", name, bands, output);

        Ok(RenderedTile {
            name: name.to_string(),
            path: output.to_path_buf(),
            bounds: self.bounds()?,
            stretch,
        })
    }
}

/// Stretch bounds of selected bands of a raster file.
pub fn get_stretch_bounds(
    path: &Path,
    bands: &[usize],
    mode: StretchMode,
) -> Result<StretchBounds> {
    LocalRaster::open(path)?.stretch_bounds(bands, mode)
}
