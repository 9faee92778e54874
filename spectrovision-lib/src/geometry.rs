//! Pixel → wavelength geometry.
//!
//! The head stores four polynomial coefficients mapping a pixel index to a
//! wavelength. From them we derive, once per connection, an interpolation
//! table that resamples the 1024 pixels onto a 1 nm output grid.

use crate::constants::{MAX_PIXEL_INDEX, PIXEL_COUNT};
use crate::error::SpectroError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use strum_macros::Display;

/// Wavelength intercept above which a head is treated as NIR.
const NIR_INTERCEPT_NM: f32 = 600.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum SensorFamily {
    #[strum(to_string = "VIS")]
    Vis,
    #[strum(to_string = "NIR")]
    Nir,
}

impl SensorFamily {
    /// Decided from the wavelength intercept, `coeffs[0]`.
    pub fn from_intercept(intercept: f32) -> Self {
        if intercept > NIR_INTERCEPT_NM {
            SensorFamily::Nir
        } else {
            SensorFamily::Vis
        }
    }

    pub fn grid(&self) -> WavelengthGrid {
        match self {
            SensorFamily::Vis => WavelengthGrid::new(340, 820),
            SensorFamily::Nir => WavelengthGrid::new(635, 1100),
        }
    }
}

/// Contiguous integer wavelengths, in nm, inclusive at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WavelengthGrid {
    pub first: u32,
    pub last: u32,
}

impl WavelengthGrid {
    pub const fn new(first: u32, last: u32) -> Self {
        Self { first, last }
    }

    pub fn len(&self) -> usize {
        (self.last.saturating_sub(self.first) + 1) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.last < self.first
    }

    pub fn range(&self) -> RangeInclusive<u32> {
        self.first..=self.last
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> {
        self.range()
    }

    pub fn contains(&self, nm: u32) -> bool {
        self.range().contains(&nm)
    }

    /// Position of `nm` in the grid.
    pub fn index_of(&self, nm: u32) -> Option<usize> {
        self.contains(nm).then(|| (nm - self.first) as usize)
    }

    /// Smallest grid covering both.
    pub fn union(&self, other: &WavelengthGrid) -> WavelengthGrid {
        WavelengthGrid::new(self.first.min(other.first), self.last.max(other.last))
    }
}

/// Pixel → wavelength polynomial, intercept first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WavelengthCoefficients(pub [f32; 4]);

impl WavelengthCoefficients {
    pub fn wavelength(&self, pixel: usize) -> f64 {
        let [c0, c1, c2, c3] = self.0.map(f64::from);
        let p = pixel as f64;
        c0 + c1 * p + c2 * p * p + c3 * p * p * p
    }

    pub fn family(&self) -> SensorFamily {
        SensorFamily::from_intercept(self.0[0])
    }
}

/// Interpolation anchor for one output wavelength.
///
/// The value at the target is `count[pixel] * (1 - weight) + count[pixel - 1] * weight`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub pixel: usize,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WavelengthTable {
    grid: WavelengthGrid,
    anchors: Vec<Anchor>,
}

impl WavelengthTable {
    pub fn grid(&self) -> WavelengthGrid {
        self.grid
    }

    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Resample pixel values onto the output grid.
    pub fn interpolate(&self, pixels: &[f64]) -> Result<Vec<f64>, SpectroError> {
        let needed = self.anchors.iter().map(|a| a.pixel).max().unwrap_or(0) + 1;
        if pixels.len() < needed {
            return Err(crate::error::CommError::LengthMismatch {
                what: "scan",
                expected: needed,
                actual: pixels.len(),
            }
            .into());
        }
        Ok(self
            .anchors
            .iter()
            .map(|a| pixels[a.pixel] * (1.0 - a.weight) + pixels[a.pixel - 1] * a.weight)
            .collect())
    }
}

/// Build the interpolation table for `grid`.
///
/// Pixels are walked in ascending order until the polynomial reaches the
/// target wavelength. An anchor pair touching a hot pixel is moved forward
/// past the hot run, or backward when the run reaches the end of the sensor.
pub fn derive_wavelength_table(
    coeffs: &WavelengthCoefficients,
    hot_pixels: &BTreeSet<u16>,
    grid: WavelengthGrid,
) -> Result<WavelengthTable, SpectroError> {
    if grid.is_empty() {
        return Err(SpectroError::InvalidSetting("empty wavelength grid".to_string()));
    }
    let is_hot = |p: usize| hot_pixels.contains(&(p as u16));
    let usable = |p: usize| !is_hot(p) && !is_hot(p - 1);

    if !(1..PIXEL_COUNT).any(usable) {
        return Err(SpectroError::InvalidSetting(
            "every pixel pair is marked hot; nothing to interpolate from".to_string(),
        ));
    }

    let mut anchors = Vec::with_capacity(grid.len());
    let mut pixel = 1usize;
    for target in grid.iter() {
        let target = f64::from(target);
        while pixel < MAX_PIXEL_INDEX && coeffs.wavelength(pixel) < target {
            pixel += 1;
        }

        let mut anchor = pixel;
        while anchor <= MAX_PIXEL_INDEX && !usable(anchor) {
            anchor += 1;
        }
        if anchor > MAX_PIXEL_INDEX {
            anchor = pixel;
            while !usable(anchor) {
                anchor -= 1;
            }
        }

        let at = coeffs.wavelength(anchor);
        let before = coeffs.wavelength(anchor - 1);
        let span = at - before;
        let weight = if span.abs() > f64::EPSILON {
            ((at - target) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };
        anchors.push(Anchor { pixel: anchor, weight });
    }

    Ok(WavelengthTable { grid, anchors })
}
