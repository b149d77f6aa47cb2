//! Display stretch for local imagery: per-band bounds and 8-bit composites.

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How the display range of a band is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StretchMode {
    /// Absolute minimum and maximum.
    MinMax,
    /// `clip`th and `100 - clip`th percentiles.
    Percentile { clip: f64 },
}

impl Default for StretchMode {
    fn default() -> Self {
        Self::Percentile { clip: 1.0 }
    }
}

/// Per-band display bounds, in the order the bands were read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StretchBounds {
    pub mins: Vec<f64>,
    pub maxs: Vec<f64>,
}

/// Pixel values of one raster band, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    /// 1-based band number.
    pub index: usize,
    pub values: Vec<f64>,
    pub nodata: Option<f64>,
}

impl Band {
    pub fn is_valid(&self, value: f64) -> bool {
        !value.is_nan() && self.nodata != Some(value)
    }

    fn valid_values(&self) -> Vec<f64> {
        self.values
            .iter()
            .copied()
            .filter(|v| self.is_valid(*v))
            .collect()
    }
}

/// `q`th percentile (0..=100) of sorted data, interpolating linearly
/// between the closest ranks.
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Display range of one band.
pub fn band_range(band: &Band, mode: StretchMode) -> Result<(f64, f64)> {
    let mut values = band.valid_values();
    if values.is_empty() {
        return Err(Error::EmptyBand(band.index));
    }

    match mode {
        StretchMode::MinMax => {
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            Ok((min, max))
        }
        StretchMode::Percentile { clip } => {
            values.sort_by(f64::total_cmp);
            // Both exist, `values` is non-empty.
            let lo = percentile(&values, clip).unwrap_or(values[0]);
            let hi = percentile(&values, 100.0 - clip).unwrap_or(values[values.len() - 1]);
            Ok((lo, hi))
        }
    }
}

pub fn stretch_bounds(bands: &[Band], mode: StretchMode) -> Result<StretchBounds> {
    let mut mins = Vec::with_capacity(bands.len());
    let mut maxs = Vec::with_capacity(bands.len());
    for band in bands {
        let (min, max) = band_range(band, mode)?;
        tracing::debug!("band {}: stretch {} - {}", band.index, min, max);
        mins.push(min);
        maxs.push(max);
    }
    Ok(StretchBounds { mins, maxs })
}

/// Rescale into 0..=255, clamping outside the bounds.
pub fn scale_to_u8(value: f64, min: f64, max: f64) -> u8 {
    if max <= min {
        return 0;
    }
    let t = ((value - min) / (max - min)).clamp(0.0, 1.0);
    (t * 255.0).round() as u8
}

/// RGBA image from three bands; pixels invalid in any band are transparent.
pub fn composite(
    bands: &[Band; 3],
    bounds: &StretchBounds,
    width: usize,
    height: usize,
) -> Result<RgbaImage> {
    let pixels = width * height;
    for band in bands {
        if band.values.len() != pixels {
            return Err(Error::InvalidBands(format!(
                "band {} has {} values, expected {}x{}",
                band.index,
                band.values.len(),
                width,
                height
            )));
        }
    }
    if bounds.mins.len() != 3 || bounds.maxs.len() != 3 {
        return Err(Error::InvalidBands(format!(
            "expected 3 stretch bounds, got {}",
            bounds.mins.len()
        )));
    }

    let image = RgbaImage::from_fn(width as u32, height as u32, |col, row| {
        let i = row as usize * width + col as usize;
        let mut rgba = [0u8, 0, 0, 255];
        for (c, band) in bands.iter().enumerate() {
            let value = band.values[i];
            if !band.is_valid(value) {
                return Rgba([0, 0, 0, 0]);
            }
            rgba[c] = scale_to_u8(value, bounds.mins[c], bounds.maxs[c]);
        }
        Rgba(rgba)
    });
    Ok(image)
}
