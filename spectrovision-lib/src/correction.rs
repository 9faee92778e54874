//! Raw counts → calibrated spectrum.
//!
//! Steps, in order: dark floor and temperature offset, reference correction,
//! wavelength interpolation, irradiance scaling.

use crate::command::IrradianceCalibration;
use crate::constants::{DARK_FLOOR_COUNTS, PHOTON_CONVERSION_FACTOR};
use crate::error::{CommError, SpectroError};
use crate::geometry::WavelengthTable;
use crate::settings::IrradianceUnit;
use tracing::warn;

/// Dark scan plus the integration time it was taken at.
#[derive(Debug, Clone, PartialEq)]
pub struct DarkReference {
    pub values: Vec<f64>,
    pub integration_us: u32,
}

/// Per-instrument reference scans, stored after the dark-floor step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct References {
    pub dark: Option<DarkReference>,
    pub light: Option<Vec<f64>>,
}

impl References {
    pub fn has_dark(&self) -> bool {
        self.dark.is_some()
    }

    pub fn can_compute_reflectance(&self) -> bool {
        self.dark.is_some() && self.light.is_some()
    }
}

fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<(), SpectroError> {
    if expected != actual {
        return Err(CommError::LengthMismatch { what, expected, actual }.into());
    }
    Ok(())
}

/// Subtract the fixed dark floor and the temperature offset from every count.
pub fn remove_dark_floor(counts: &[u16], temperature_offset: f64) -> Vec<f64> {
    counts
        .iter()
        .map(|&c| f64::from(c) - DARK_FLOOR_COUNTS - temperature_offset)
        .collect()
}

/// Percentage of the light reference, `100 · (s − d) / max(1, l − d)`.
pub fn reflectance(sample: &[f64], dark: &[f64], light: &[f64]) -> Result<Vec<f64>, SpectroError> {
    check_len("dark reference", sample.len(), dark.len())?;
    check_len("light reference", sample.len(), light.len())?;
    Ok(sample
        .iter()
        .zip(dark)
        .zip(light)
        .map(|((s, d), l)| 100.0 * (s - d) / (l - d).max(1.0))
        .collect())
}

/// Subtract a dark scan rescaled to the current integration time.
pub fn subtract_dark(sample: &[f64], dark: &DarkReference, integration_us: u32) -> Result<Vec<f64>, SpectroError> {
    check_len("dark reference", sample.len(), dark.values.len())?;
    let scale = f64::from(integration_us) / f64::from(dark.integration_us.max(1));
    Ok(sample.iter().zip(&dark.values).map(|(s, d)| s - d * scale).collect())
}

/// Reflectance when asked for and possible, otherwise plain dark subtraction
/// if a dark scan exists.
pub fn apply_references(
    sample: Vec<f64>,
    references: &References,
    rt: bool,
    integration_us: u32,
) -> Result<Vec<f64>, SpectroError> {
    if rt {
        if let (Some(dark), Some(light)) = (&references.dark, &references.light) {
            return reflectance(&sample, &dark.values, light);
        }
        warn!(
            dark = references.has_dark(),
            light = references.light.is_some(),
            "Reflectance requested without both references, falling back"
        );
    }
    match &references.dark {
        Some(dark) => subtract_dark(&sample, dark, integration_us),
        None => Ok(sample),
    }
}

/// Scale interpolated values by the stored irradiance ratios.
pub fn apply_irradiance(
    values: Vec<f64>,
    calibration: &IrradianceCalibration,
    unit: IrradianceUnit,
    wavelengths: impl Iterator<Item = u32>,
    integration_us: u32,
) -> Result<Vec<f64>, SpectroError> {
    if unit == IrradianceUnit::Counts {
        return Ok(values);
    }
    check_len("irradiance calibration", values.len(), calibration.ratios.len())?;
    let exposure = calibration.reference_integration_us / f64::from(integration_us.max(1));
    Ok(values
        .iter()
        .zip(&calibration.ratios)
        .zip(wavelengths)
        .map(|((v, ratio), nm)| {
            let energy = v * ratio * exposure;
            match unit {
                IrradianceUnit::Photon => energy * f64::from(nm) * PHOTON_CONVERSION_FACTOR,
                _ => energy,
            }
        })
        .collect())
}

/// Everything the pipeline needs from the instrument for one scan.
pub struct Correction<'a> {
    pub table: &'a WavelengthTable,
    pub references: &'a References,
    pub calibration: Option<&'a IrradianceCalibration>,
    pub unit: IrradianceUnit,
    pub temperature_offset: f64,
    pub integration_us: u32,
}

impl Correction<'_> {
    /// Run every step and return values on the table's output grid.
    pub fn apply(&self, counts: &[u16], rt: bool) -> Result<Vec<f64>, SpectroError> {
        let floored = remove_dark_floor(counts, self.temperature_offset);
        let referenced = apply_references(floored, self.references, rt, self.integration_us)?;
        let interpolated = self.table.interpolate(&referenced)?;
        match self.calibration {
            Some(calibration) => apply_irradiance(
                interpolated,
                calibration,
                self.unit,
                self.table.grid().iter(),
                self.integration_us,
            ),
            None => Ok(interpolated),
        }
    }
}
