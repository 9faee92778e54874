//! Connection options and the acquisition parameters supplied by the control layer.

use crate::constants::{DEFAULT_INTEGRATION_US, MAX_SCANS_TO_AVERAGE, MIN_INTEGRATION_US};
use crate::error::SpectroError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use strum_macros::Display;

/// Cubic temperature offset subtracted from every raw count, `a·t³ + b·t² + c·t + d`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureCompensation {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl TemperatureCompensation {
    pub const NONE: Self = Self {
        a: 0.0,
        b: 0.0,
        c: 0.0,
        d: 0.0,
    };

    pub fn offset(&self, celsius: f64) -> f64 {
        self.a * celsius.powi(3) + self.b * celsius.powi(2) + self.c * celsius + self.d
    }
}

impl Default for TemperatureCompensation {
    fn default() -> Self {
        Self {
            a: 0.004489071,
            b: -0.2657377928,
            c: 6.0963287296,
            d: -44.1423212062,
        }
    }
}

/// How to open a spectroradiometer.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    /// Only open the head whose USB serial (or short serial) matches.
    pub serial: Option<String>,
    /// Issue a USB port reset before claiming the interface.
    pub reset_before_claim: bool,
    /// Integration time pushed to the head during the handshake, µs.
    pub initial_integration_us: u32,
    pub interface: u8,
    pub temperature: TemperatureCompensation,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            serial: None,
            reset_before_claim: false,
            initial_integration_us: DEFAULT_INTEGRATION_US,
            interface: 0,
            temperature: TemperatureCompensation::default(),
        }
    }
}

impl DeviceConfig {
    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = Some(serial.into());
        self
    }

    pub fn reset_before_claim(mut self) -> Self {
        self.reset_before_claim = true;
        self
    }

    pub fn with_initial_integration(mut self, micros: u32) -> Self {
        self.initial_integration_us = micros;
        self
    }

    pub fn with_temperature_compensation(mut self, temperature: TemperatureCompensation) -> Self {
        self.temperature = temperature;
        self
    }
}

/// What the finished spectrum represents, and which trailing totals it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, Serialize, Deserialize)]
pub enum PlotMode {
    /// Dark-floor corrected counts.
    #[default]
    Relative,
    /// Percentage of the light reference.
    ReflectanceTransmittance,
    /// W·m⁻²·nm⁻¹
    EnergyFlux,
    /// µmol·m⁻²·s⁻¹·nm⁻¹
    PhotonFlux,
    Illuminance,
}

impl PlotMode {
    /// Irradiance scaling applied on top of the counts.
    pub fn irradiance_unit(&self) -> IrradianceUnit {
        match self {
            PlotMode::Relative | PlotMode::ReflectanceTransmittance => IrradianceUnit::Counts,
            PlotMode::EnergyFlux | PlotMode::Illuminance => IrradianceUnit::Energy,
            PlotMode::PhotonFlux => IrradianceUnit::Photon,
        }
    }

    pub fn is_reflectance(&self) -> bool {
        matches!(self, PlotMode::ReflectanceTransmittance)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, Serialize, Deserialize)]
pub enum IrradianceUnit {
    #[default]
    Counts,
    Energy,
    Photon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, Serialize, Deserialize)]
pub enum IlluminanceUnit {
    #[default]
    Lux,
    Footcandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum IntegrationMode {
    #[default]
    Auto,
    Manual { micros: u32 },
}

/// Inclusive wavelength band in nm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WavelengthRange {
    pub start: u32,
    pub end: u32,
}

impl WavelengthRange {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, nm: u32) -> bool {
        (self.start..=self.end).contains(&nm)
    }

    fn validate(&self, name: &str) -> Result<(), SpectroError> {
        if self.start > self.end {
            return Err(SpectroError::InvalidSetting(format!(
                "{} range {}..{} nm is inverted",
                name, self.start, self.end
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for WavelengthRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{} nm", self.start, self.end)
    }
}

/// Parameters for one acquisition cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionSettings {
    pub plot_mode: PlotMode,
    pub illuminance_unit: IlluminanceUnit,
    pub integration: IntegrationMode,
    pub scans_to_average: u16,
    /// Band integrated into the trailing total.
    pub total_range: WavelengthRange,
    /// Band whose share of the total is reported.
    pub fraction_range: WavelengthRange,
    pub red_band: WavelengthRange,
    pub far_red_band: WavelengthRange,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            plot_mode: PlotMode::default(),
            illuminance_unit: IlluminanceUnit::default(),
            integration: IntegrationMode::default(),
            scans_to_average: 1,
            total_range: WavelengthRange::new(400, 700),
            fraction_range: WavelengthRange::new(400, 500),
            red_band: WavelengthRange::new(655, 665),
            far_red_band: WavelengthRange::new(725, 735),
        }
    }
}

impl AcquisitionSettings {
    pub fn validate(&self) -> Result<(), SpectroError> {
        if !(1..=MAX_SCANS_TO_AVERAGE).contains(&self.scans_to_average) {
            return Err(SpectroError::InvalidSetting(format!(
                "scans to average must be 1-{}, got {}",
                MAX_SCANS_TO_AVERAGE, self.scans_to_average
            )));
        }
        if let IntegrationMode::Manual { micros } = self.integration {
            if micros < MIN_INTEGRATION_US {
                return Err(SpectroError::InvalidSetting(format!(
                    "integration time must be at least {} µs, got {}",
                    MIN_INTEGRATION_US, micros
                )));
            }
        }
        self.total_range.validate("total")?;
        self.fraction_range.validate("fraction")?;
        self.red_band.validate("red")?;
        self.far_red_band.validate("far-red")?;
        Ok(())
    }

    pub fn is_auto(&self) -> bool {
        matches!(self.integration, IntegrationMode::Auto)
    }

    /// Load and validate settings from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SpectroError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SpectroError::InvalidSetting(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, SpectroError> {
        let settings: Self =
            serde_json::from_str(text).map_err(|e| SpectroError::InvalidSetting(format!("bad settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = AcquisitionSettings::default();
        settings.validate().expect("defaults validate");
        assert!(settings.is_auto());
        assert_eq!(settings.red_band, WavelengthRange::new(655, 665));
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut settings = AcquisitionSettings {
            scans_to_average: 0,
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(SpectroError::InvalidSetting(_))));

        settings.scans_to_average = 5001;
        assert!(settings.validate().is_err());

        settings.scans_to_average = 10;
        settings.integration = IntegrationMode::Manual { micros: 5 };
        assert!(settings.validate().is_err());

        settings.integration = IntegrationMode::Manual { micros: 10 };
        settings.total_range = WavelengthRange::new(700, 400);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings = AcquisitionSettings::from_json(
            r#"{ "plot_mode": "PhotonFlux", "integration": { "mode": "manual", "micros": 25000 } }"#,
        )
        .expect("parse");
        assert_eq!(settings.plot_mode, PlotMode::PhotonFlux);
        assert_eq!(settings.integration, IntegrationMode::Manual { micros: 25000 });
        assert_eq!(settings.scans_to_average, 1);
        assert_eq!(settings.plot_mode.irradiance_unit(), IrradianceUnit::Photon);
    }

    #[test]
    fn temperature_offset_matches_polynomial() {
        let comp = TemperatureCompensation::default();
        let t = 25.0;
        let expected = 0.004489071 * 15625.0 - 0.2657377928 * 625.0 + 6.0963287296 * 25.0 - 44.1423212062;
        assert!((comp.offset(t) - expected).abs() < 1e-9);
        assert_eq!(TemperatureCompensation::NONE.offset(t), 0.0);
    }

    #[test]
    fn config_builder() {
        let config = DeviceConfig::default()
            .with_serial("S12345")
            .reset_before_claim()
            .with_initial_integration(20_000);
        assert_eq!(config.serial.as_deref(), Some("S12345"));
        assert!(config.reset_before_claim);
        assert_eq!(config.initial_integration_us, 20_000);
    }
}
