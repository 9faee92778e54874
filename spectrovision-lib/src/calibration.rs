//! Irradiance calibration from a reference lamp.
//!
//! A lamp file lists `wavelength irradiance` pairs, one per line, usually at
//! coarse steps and preceded by a free-form header. The lamp output is
//! interpolated onto the head's output grid and divided by a calibration
//! scan taken under that lamp, giving one ratio per wavelength.

use crate::command::IrradianceCalibration;
use crate::error::{CommError, SpectroError};
use crate::geometry::WavelengthGrid;
use std::path::Path;
use tracing::debug;

/// Tabulated lamp output, sorted by wavelength.
#[derive(Debug, Clone, PartialEq)]
pub struct LampTable {
    points: Vec<(f64, f64)>,
}

impl LampTable {
    /// Parse lamp file contents. Lines that do not start with two numbers are skipped.
    pub fn parse(text: &str) -> Result<Self, SpectroError> {
        let mut points: Vec<(f64, f64)> = text
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let nm = fields.next()?.parse::<f64>().ok()?;
                let irradiance = fields.next()?.parse::<f64>().ok()?;
                Some((nm, irradiance))
            })
            .collect();
        if points.len() < 2 {
            return Err(SpectroError::InvalidSetting(format!(
                "lamp file has {} data rows, need at least 2",
                points.len()
            )));
        }
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        debug!(rows = points.len(), first = points[0].0, last = points[points.len() - 1].0, "Parsed lamp table");
        Ok(Self { points })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SpectroError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SpectroError::InvalidSetting(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&text)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Linear interpolation. Zero outside the tabulated range.
    pub fn at(&self, nm: f64) -> f64 {
        let upper = self.points.partition_point(|&(x, _)| x < nm);
        match (upper.checked_sub(1).map(|i| self.points[i]), self.points.get(upper)) {
            (_, Some(&(x, y))) if x == nm => y,
            (Some((x0, y0)), Some(&(x1, y1))) => y0 + (y1 - y0) * (nm - x0) / (x1 - x0),
            _ => 0.0,
        }
    }

    pub fn resample(&self, grid: &WavelengthGrid) -> Vec<f64> {
        grid.iter().map(|nm| self.at(f64::from(nm))).collect()
    }
}

/// Ratios turning a calibration scan into the lamp's known output.
///
/// Wavelengths where the scan is not positive get a ratio of zero.
pub fn compute_calibration(
    lamp: &LampTable,
    grid: &WavelengthGrid,
    scan: &[f64],
    scan_integration_us: u32,
) -> Result<IrradianceCalibration, SpectroError> {
    if scan.len() != grid.len() {
        return Err(CommError::LengthMismatch {
            what: "calibration scan",
            expected: grid.len(),
            actual: scan.len(),
        }
        .into());
    }
    let ratios = lamp
        .resample(grid)
        .into_iter()
        .zip(scan)
        .map(|(lamp, &counts)| if counts > 0.0 { lamp / counts } else { 0.0 })
        .collect();
    Ok(IrradianceCalibration {
        reference_integration_us: f64::from(scan_integration_us),
        ratios,
    })
}
