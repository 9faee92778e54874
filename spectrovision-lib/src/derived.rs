//! Totals and photobiology metrics appended to a finished spectrum.

use crate::constants::{LUX_MULTIPLIER, LUX_TO_FOOTCANDLES};
use crate::curves;
use crate::error::{CommError, SpectroError};
use crate::geometry::WavelengthGrid;
use crate::settings::{AcquisitionSettings, IlluminanceUnit, PlotMode, WavelengthRange};
use serde::{Deserialize, Serialize};

const PPF_BAND: WavelengthRange = WavelengthRange::new(400, 700);

/// Scalars that follow the spectrum values, selected by plot mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Totals {
    None,
    Energy {
        total: f64,
        fraction: f64,
        red_far_red: f64,
    },
    Photon {
        total: f64,
        ppf: f64,
        ypf: f64,
        ppe: f64,
        fraction: f64,
        red_far_red: f64,
    },
    Illuminance {
        total: f64,
        fraction: f64,
        red_far_red: f64,
        illuminance: f64,
    },
}

impl Totals {
    pub fn to_vec(&self) -> Vec<f64> {
        match *self {
            Totals::None => Vec::new(),
            Totals::Energy {
                total,
                fraction,
                red_far_red,
            } => vec![total, fraction, red_far_red],
            Totals::Photon {
                total,
                ppf,
                ypf,
                ppe,
                fraction,
                red_far_red,
            } => vec![total, ppf, ypf, ppe, fraction, red_far_red],
            Totals::Illuminance {
                total,
                fraction,
                red_far_red,
                illuminance,
            } => vec![total, fraction, red_far_red, illuminance],
        }
    }
}

/// A finished measurement aligned to an output grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    pub grid: WavelengthGrid,
    pub values: Vec<f64>,
    pub integration_us: u32,
    pub totals: Totals,
}

impl Spectrum {
    pub fn new(grid: WavelengthGrid, values: Vec<f64>, integration_us: u32) -> Result<Self, SpectroError> {
        if values.len() != grid.len() {
            return Err(CommError::LengthMismatch {
                what: "spectrum",
                expected: grid.len(),
                actual: values.len(),
            }
            .into());
        }
        Ok(Self {
            grid,
            values,
            integration_us,
            totals: Totals::None,
        })
    }

    pub fn points(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.grid.iter().zip(self.values.iter().copied())
    }

    pub fn value_at(&self, nm: u32) -> Option<f64> {
        self.grid.index_of(nm).and_then(|i| self.values.get(i).copied())
    }

    /// Sum of the values whose wavelength lies in `range`.
    pub fn sum_over(&self, range: WavelengthRange) -> f64 {
        self.points().filter(|(nm, _)| range.contains(*nm)).map(|(_, v)| v).sum()
    }

    fn weighted_sum(&self, weight: impl Fn(u32) -> f64) -> f64 {
        self.points().map(|(nm, v)| v * weight(nm)).sum()
    }

    /// Values, then the integration time, then the totals.
    pub fn to_flat(&self) -> Vec<f64> {
        let mut flat = Vec::with_capacity(self.values.len() + 7);
        flat.extend_from_slice(&self.values);
        flat.push(f64::from(self.integration_us));
        flat.extend(self.totals.to_vec());
        flat
    }

    /// Compute the totals for `settings.plot_mode`, converting the values to
    /// lux or footcandles first in illuminance mode.
    pub fn finish(mut self, settings: &AcquisitionSettings) -> Self {
        self.totals = match settings.plot_mode {
            PlotMode::Relative | PlotMode::ReflectanceTransmittance => Totals::None,
            PlotMode::EnergyFlux => {
                let (total, fraction, red_far_red) = self.band_totals(settings);
                Totals::Energy {
                    total,
                    fraction,
                    red_far_red,
                }
            }
            PlotMode::PhotonFlux => {
                let (total, fraction, red_far_red) = self.band_totals(settings);
                let metrics = self.photon_metrics();
                Totals::Photon {
                    total,
                    ppf: metrics.ppf,
                    ypf: metrics.ypf,
                    ppe: metrics.ppe,
                    fraction,
                    red_far_red,
                }
            }
            PlotMode::Illuminance => {
                let (total, fraction, red_far_red) = self.band_totals(settings);
                self.values = illuminance(&self.grid, &self.values, settings.illuminance_unit);
                let illuminance = self.values.iter().sum();
                Totals::Illuminance {
                    total,
                    fraction,
                    red_far_red,
                    illuminance,
                }
            }
        };
        self
    }

    fn band_totals(&self, settings: &AcquisitionSettings) -> (f64, f64, f64) {
        let total = self.sum_over(settings.total_range);
        let fraction = self.sum_over(settings.fraction_range) / nonzero(total);
        let red = self.sum_over(settings.red_band);
        let far_red = self.sum_over(settings.far_red_band);
        (total, fraction, red / nonzero(far_red))
    }

    pub fn photon_metrics(&self) -> PhotonMetrics {
        let ppf = self.sum_over(PPF_BAND);
        let ypf = self.weighted_sum(curves::rqe);
        let red = self.weighted_sum(curves::sigma_r);
        let far_red = self.weighted_sum(curves::sigma_fr);
        let ppe = if red == 0.0 { 0.0 } else { red / (red + far_red) };
        PhotonMetrics { ppf, ypf, ppe }
    }

    /// First discrete derivative at 1 nm steps. The last element is 0.
    pub fn first_derivative(&self) -> Vec<f64> {
        derivative(&self.values)
    }

    pub fn second_derivative(&self) -> Vec<f64> {
        derivative(&derivative(&self.values))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhotonMetrics {
    pub ppf: f64,
    pub ypf: f64,
    pub ppe: f64,
}

fn nonzero(denominator: f64) -> f64 {
    if denominator == 0.0 { 1.0 } else { denominator }
}

fn derivative(values: &[f64]) -> Vec<f64> {
    let mut out: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    if !values.is_empty() {
        out.push(0.0);
    }
    out
}

/// Weight energy values by the photopic curve. Zero outside 380-780 nm.
pub fn illuminance(grid: &WavelengthGrid, values: &[f64], unit: IlluminanceUnit) -> Vec<f64> {
    let scale = match unit {
        IlluminanceUnit::Lux => LUX_MULTIPLIER,
        IlluminanceUnit::Footcandle => LUX_MULTIPLIER * LUX_TO_FOOTCANDLES,
    };
    grid.iter()
        .zip(values)
        .map(|(nm, v)| scale * v * curves::photopic(nm))
        .collect()
}

/// Merge a VIS and a NIR spectrum onto their combined grid, averaging where
/// they overlap.
pub fn merge(first: &Spectrum, second: &Spectrum) -> Spectrum {
    let grid = first.grid.union(&second.grid);
    let values = grid
        .iter()
        .map(|nm| match (first.value_at(nm), second.value_at(nm)) {
            (Some(a), Some(b)) => (a + b) / 2.0,
            (Some(v), None) | (None, Some(v)) => v,
            (None, None) => 0.0,
        })
        .collect();
    Spectrum {
        grid,
        values,
        integration_us: first.integration_us.max(second.integration_us),
        totals: Totals::None,
    }
}
