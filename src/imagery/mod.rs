//! Imagery shown under the labels: remote WMS layers or local raster tiles.

#[cfg(feature = "local-tiles")]
pub mod raster;
pub mod stretch;
pub mod wms;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

pub use stretch::{StretchBounds, StretchMode};
pub use wms::WmsLayer;

/// Three 1-based band numbers mapped to red, green and blue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandTriplet(pub [usize; 3]);

impl BandTriplet {
    /// Red, green, blue of blue-green-red-NIR imagery.
    pub const TRUE_COLOR: BandTriplet = BandTriplet([3, 2, 1]);
    /// NIR, red, green of blue-green-red-NIR imagery.
    pub const FALSE_COLOR: BandTriplet = BandTriplet([4, 3, 2]);

    pub fn bands(&self) -> [usize; 3] {
        self.0
    }

    /// Fails if any band is 0 or beyond `count`.
    pub fn validate(&self, count: usize) -> Result<()> {
        match self.0.iter().find(|b| **b == 0 || **b > count) {
            Some(band) => Err(Error::InvalidBands(format!(
                "band {band} requested from a raster with {count} bands"
            ))),
            None => Ok(()),
        }
    }
}

impl FromStr for BandTriplet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bands = s
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<usize>()
                    .map_err(|_| Error::InvalidBands(format!("'{s}' is not a band list")))
            })
            .collect::<Result<Vec<_>>>()?;

        match bands.as_slice() {
            [r, g, b] => Ok(Self([*r, *g, *b])),
            _ => Err(Error::InvalidBands(format!(
                "expected three bands, got '{s}'"
            ))),
        }
    }
}

impl fmt::Display for BandTriplet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "{r},{g},{b}")
    }
}
