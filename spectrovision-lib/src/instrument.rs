use crate::acquisition::{AcquisitionState, auto_integrate, settle_duration, wait_settled};
use crate::calibration::{LampTable, compute_calibration};
use crate::command::{DeviceLink, IrradianceCalibration};
use crate::constants::{MAX_AUTO_ITERATIONS, MAX_HOT_PIXELS, MAX_PIXEL_INDEX, PID, VID};
use crate::correction::{Correction, DarkReference, References, remove_dark_floor};
use crate::derived::Spectrum;
use crate::error::SpectroError;
use crate::geometry::{SensorFamily, WavelengthCoefficients, WavelengthGrid, WavelengthTable, derive_wavelength_table};
use crate::settings::{AcquisitionSettings, DeviceConfig, IntegrationMode, IrradianceUnit};
use crate::transport::{BulkPipe, UsbPipe};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

const RESET_SETTLE: Duration = Duration::from_millis(50);

/// A stop signal nobody can raise. [`wait_settled`] always runs to its deadline on it.
fn never_stopped() -> watch::Receiver<bool> {
    watch::channel(false).1
}

/// An attached head as seen on the bus, before it is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSummary {
    pub bus_number: u8,
    pub device_address: u8,
    pub serial_number: Option<String>,
}

impl DeviceSummary {
    /// Characters 2..6 of the USB serial, printed on the sensor head label.
    pub fn short_serial(&self) -> Option<&str> {
        self.serial_number.as_deref().and_then(short_serial)
    }

    fn matches(&self, wanted: &str) -> bool {
        self.serial_number.as_deref() == Some(wanted) || self.short_serial() == Some(wanted)
    }
}

impl fmt::Display for DeviceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bus {} addr {} serial {}",
            self.bus_number,
            self.device_address,
            self.serial_number.as_deref().unwrap_or("?")
        )
    }
}

fn short_serial(serial: &str) -> Option<&str> {
    serial.get(2..6)
}

/// Enumerate attached spectroradiometers.
pub fn list_devices() -> Result<Vec<DeviceSummary>, SpectroError> {
    Ok(nusb::list_devices()?
        .filter(|d| d.vendor_id() == VID && d.product_id() == PID)
        .map(|d| DeviceSummary {
            bus_number: d.bus_number(),
            device_address: d.device_address(),
            serial_number: d.serial_number().map(str::to_string),
        })
        .collect())
}

/// Who the instrument is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub serial_number: Option<String>,
    pub alias: Option<String>,
}

impl Identity {
    pub fn short_serial(&self) -> Option<&str> {
        self.serial_number.as_deref().and_then(short_serial)
    }

    /// Alias if set, otherwise the short serial.
    pub fn display_name(&self) -> String {
        self.alias
            .clone()
            .or_else(|| self.short_serial().map(str::to_string))
            .unwrap_or_else(|| "spectroradiometer".to_string())
    }
}

/// One connected spectroradiometer and everything known about it.
pub struct Instrument<P: BulkPipe = UsbPipe> {
    link: DeviceLink<P>,
    config: DeviceConfig,
    identity: Identity,
    coefficients: WavelengthCoefficients,
    hot_pixels: BTreeSet<u16>,
    table: WavelengthTable,
    calibration: Option<IrradianceCalibration>,
    settings: AcquisitionSettings,
    integration_us: u32,
    scans_to_average: u16,
    last_temperature: Option<f32>,
    references: References,
    state: AcquisitionState,
    last_spectrum: Option<Spectrum>,
}

impl Instrument<UsbPipe> {
    /// Open the first matching head and run the connect handshake.
    pub async fn connect(config: DeviceConfig) -> Result<Self, SpectroError> {
        info!("Searching for spectroradiometer...");
        let device_info = nusb::list_devices()?
            .filter(|d| d.vendor_id() == VID && d.product_id() == PID)
            .find(|d| match &config.serial {
                Some(wanted) => DeviceSummary {
                    bus_number: d.bus_number(),
                    device_address: d.device_address(),
                    serial_number: d.serial_number().map(str::to_string),
                }
                .matches(wanted),
                None => true,
            })
            .ok_or(SpectroError::DeviceNotFound)?;

        info!(
            "Found device on bus {} addr {}",
            device_info.bus_number(),
            device_info.device_address()
        );
        let serial_number = device_info.serial_number().map(str::to_string);

        let device = device_info.open()?;
        if config.reset_before_claim {
            info!("Performing USB device reset...");
            device.reset()?;
            tokio::time::sleep(RESET_SETTLE).await;
        }

        let interface = device.detach_and_claim_interface(config.interface).map_err(|e| {
            warn!(error = %e, "Could not claim interface, is another program using the head?");
            SpectroError::from(e)
        })?;
        info!("Interface claimed successfully.");

        let identity = Identity {
            serial_number,
            alias: None,
        };
        Self::from_pipe(UsbPipe::new(interface), config, identity).await
    }
}

impl<P: BulkPipe> Instrument<P> {
    /// Run the connect handshake over an already opened pipe.
    pub async fn from_pipe(pipe: P, config: DeviceConfig, mut identity: Identity) -> Result<Self, SpectroError> {
        let link = DeviceLink::new(pipe);

        info!("--- Starting Connection Handshake ---");
        let drained = link.transport().flush().await?;
        if drained > 0 {
            debug!(drained, "Discarded stale bytes from a previous session");
        }

        identity.alias = link.get_alias().await?;
        let coefficients = WavelengthCoefficients(link.get_wavelength_coefficients().await?);
        let hot_pixels: BTreeSet<u16> = link.get_hot_pixels().await?.into_iter().collect();
        let family = coefficients.family();
        let table = derive_wavelength_table(&coefficients, &hot_pixels, family.grid())?;
        let calibration = link.get_irradiance_calibration().await?;
        link.set_integration_time(config.initial_integration_us).await?;

        info!(
            name = %identity.display_name(),
            family = %family,
            hot_pixels = hot_pixels.len(),
            calibrated = calibration.is_some(),
            "Spectroradiometer ready"
        );

        let integration_us = config.initial_integration_us;
        Ok(Self {
            link,
            config,
            identity,
            coefficients,
            hot_pixels,
            table,
            calibration,
            settings: AcquisitionSettings::default(),
            integration_us,
            scans_to_average: 1,
            last_temperature: None,
            references: References::default(),
            state: AcquisitionState::Idle,
            last_spectrum: None,
        })
    }

    pub fn link(&self) -> &DeviceLink<P> {
        &self.link
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn name(&self) -> String {
        self.identity.display_name()
    }

    pub fn coefficients(&self) -> &WavelengthCoefficients {
        &self.coefficients
    }

    pub fn family(&self) -> SensorFamily {
        self.coefficients.family()
    }

    pub fn grid(&self) -> WavelengthGrid {
        self.table.grid()
    }

    pub fn wavelength_table(&self) -> &WavelengthTable {
        &self.table
    }

    pub fn hot_pixels(&self) -> &BTreeSet<u16> {
        &self.hot_pixels
    }

    pub fn irradiance_calibration(&self) -> Option<&IrradianceCalibration> {
        self.calibration.as_ref()
    }

    pub fn settings(&self) -> &AcquisitionSettings {
        &self.settings
    }

    pub fn integration_us(&self) -> u32 {
        self.integration_us
    }

    pub fn scans_to_average(&self) -> u16 {
        self.scans_to_average
    }

    pub fn auto_integration(&self) -> bool {
        self.settings.is_auto()
    }

    pub fn last_temperature(&self) -> Option<f32> {
        self.last_temperature
    }

    pub fn references(&self) -> &References {
        &self.references
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    pub fn last_spectrum(&self) -> Option<&Spectrum> {
        self.last_spectrum.as_ref()
    }

    /// How long one triggered scan takes with the current settings.
    pub fn settle_duration(&self) -> Duration {
        settle_duration(self.integration_us, self.scans_to_average)
    }

    /// Current integration period as a read-timeout basis.
    pub fn integration(&self) -> Duration {
        Duration::from_micros(u64::from(self.integration_us))
    }

    pub(crate) fn set_state(&mut self, state: AcquisitionState) {
        trace!(from = %self.state, to = %state, "Acquisition state");
        self.state = state;
    }

    pub async fn set_alias(&mut self, alias: &str) -> Result<(), SpectroError> {
        self.link.set_alias(alias).await?;
        self.identity.alias = (!alias.is_empty()).then(|| alias.to_string());
        Ok(())
    }

    /// Serial number as reported over the protocol rather than the USB descriptor.
    pub async fn query_serial_number(&self) -> Result<String, SpectroError> {
        self.link.get_serial_number().await
    }

    pub async fn read_temperature(&mut self) -> Result<f32, SpectroError> {
        let celsius = self.link.read_temperature().await?;
        self.last_temperature = Some(celsius);
        Ok(celsius)
    }

    pub async fn set_integration_time(&mut self, micros: u32) -> Result<(), SpectroError> {
        self.link.set_integration_time(micros).await?;
        self.integration_us = micros;
        Ok(())
    }

    pub async fn set_scans_to_average(&mut self, scans: u16) -> Result<(), SpectroError> {
        self.link.set_scans_to_average(scans).await?;
        self.scans_to_average = scans;
        Ok(())
    }

    /// Adopt new acquisition parameters, pushing to the head only what changed.
    pub async fn apply_settings(&mut self, settings: AcquisitionSettings) -> Result<(), SpectroError> {
        settings.validate()?;
        if settings.scans_to_average != self.scans_to_average {
            self.set_scans_to_average(settings.scans_to_average).await?;
        }
        if let IntegrationMode::Manual { micros } = settings.integration {
            if micros != self.integration_us {
                self.set_integration_time(micros).await?;
            }
        }
        if settings.plot_mode.irradiance_unit() != IrradianceUnit::Counts && self.calibration.is_none() {
            warn!(mode = %settings.plot_mode, "Head has no irradiance calibration, values stay in counts");
        }
        debug!(mode = %settings.plot_mode, auto = settings.is_auto(), "Acquisition settings applied");
        self.settings = settings;
        Ok(())
    }

    /// Trigger one scan, wait for it and collect the raw counts.
    ///
    /// `None` when `stop` was raised during the wait. The triggered scan is
    /// then collected and thrown away so it cannot answer a later request.
    pub async fn read_counts(&mut self, stop: &mut watch::Receiver<bool>) -> Result<Option<Vec<u16>>, SpectroError> {
        self.set_state(AcquisitionState::Requested);
        self.link.start_measurement().await?;
        if !wait_settled(self.settle_duration(), stop).await {
            self.set_state(AcquisitionState::Idle);
            self.link.discard_measurement(self.integration()).await?;
            return Ok(None);
        }
        let counts = self.link.acquire_measurement(self.integration()).await?;
        Ok(Some(counts))
    }

    /// Run the auto-integration loop starting from `counts`.
    ///
    /// Every change is pushed to the head and followed by a fresh scan, so the
    /// returned counts always belong to the final integration time.
    pub async fn auto_adjust(
        &mut self,
        mut counts: Vec<u16>,
        stop: &mut watch::Receiver<bool>,
    ) -> Result<Option<Vec<u16>>, SpectroError> {
        for iteration in 0..MAX_AUTO_ITERATIONS {
            let Some(next) = auto_integrate(&counts, self.integration_us) else {
                break;
            };
            self.set_state(AcquisitionState::AutoAdjusting(iteration + 1));
            debug!(from = self.integration_us, to = next, iteration, "Auto-integration adjusting");
            self.set_integration_time(next).await?;
            match self.read_counts(stop).await? {
                Some(fresh) => counts = fresh,
                None => return Ok(None),
            }
        }
        Ok(Some(counts))
    }

    /// Correct raw counts onto the output grid. Totals are not computed.
    pub async fn correct_counts(&mut self, counts: &[u16], rt: bool) -> Result<Spectrum, SpectroError> {
        let unit = if rt {
            IrradianceUnit::Counts
        } else {
            self.settings.plot_mode.irradiance_unit()
        };
        self.correct_with(counts, rt, unit).await
    }

    async fn correct_with(&mut self, counts: &[u16], rt: bool, unit: IrradianceUnit) -> Result<Spectrum, SpectroError> {
        let offset = self.temperature_offset().await?;
        let values = Correction {
            table: &self.table,
            references: &self.references,
            calibration: self.calibration.as_ref(),
            unit,
            temperature_offset: offset,
            integration_us: self.integration_us,
        }
        .apply(counts, rt)?;
        Spectrum::new(self.table.grid(), values, self.integration_us)
    }

    /// Correct counts, compute totals for the active plot mode and keep the result.
    pub async fn finish_acquisition(&mut self, counts: &[u16], rt: bool) -> Result<Spectrum, SpectroError> {
        let spectrum = self.correct_counts(counts, rt).await?.finish(&self.settings);
        self.store(spectrum.clone());
        Ok(spectrum)
    }

    /// Record a finished spectrum, e.g. one merged with a paired head.
    pub fn store(&mut self, spectrum: Spectrum) {
        self.last_spectrum = Some(spectrum);
        self.set_state(AcquisitionState::Ready);
    }

    /// One full measurement: trigger, wait, collect, auto-adjust, correct.
    pub async fn acquire(&mut self, rt: bool) -> Result<Spectrum, SpectroError> {
        let Some(spectrum) = self.acquire_until(rt, &mut never_stopped()).await? else {
            return Err(SpectroError::Cancelled);
        };
        Ok(spectrum)
    }

    /// As [`Instrument::acquire`], returning `None` if `stop` is raised.
    pub async fn acquire_until(
        &mut self,
        rt: bool,
        stop: &mut watch::Receiver<bool>,
    ) -> Result<Option<Spectrum>, SpectroError> {
        let result = self.acquire_inner(rt, stop).await;
        if result.is_err() {
            self.set_state(AcquisitionState::Idle);
        }
        result
    }

    async fn acquire_inner(
        &mut self,
        rt: bool,
        stop: &mut watch::Receiver<bool>,
    ) -> Result<Option<Spectrum>, SpectroError> {
        let Some(mut counts) = self.read_counts(stop).await? else {
            return Ok(None);
        };
        if self.auto_integration() {
            match self.auto_adjust(counts, stop).await? {
                Some(settled) => counts = settled,
                None => return Ok(None),
            }
        }
        self.finish_acquisition(&counts, rt).await.map(Some)
    }

    async fn temperature_offset(&mut self) -> Result<f64, SpectroError> {
        let celsius = self.read_temperature().await?;
        Ok(self.config.temperature.offset(f64::from(celsius)))
    }

    /// Scan at the current integration time without auto-adjusting and with
    /// only the dark floor removed.
    async fn reference_scan(&mut self) -> Result<Vec<f64>, SpectroError> {
        let Some(counts) = self.read_counts(&mut never_stopped()).await? else {
            return Err(SpectroError::Cancelled);
        };
        let offset = self.temperature_offset().await?;
        self.set_state(AcquisitionState::Idle);
        Ok(remove_dark_floor(&counts, offset))
    }

    /// Cover the head, then call this.
    pub async fn take_dark_reference(&mut self) -> Result<(), SpectroError> {
        let values = self.reference_scan().await?;
        info!(integration_us = self.integration_us, "Dark reference taken");
        self.references.dark = Some(DarkReference {
            values,
            integration_us: self.integration_us,
        });
        Ok(())
    }

    pub fn set_dark_reference(&mut self, reference: DarkReference) {
        self.references.dark = Some(reference);
    }

    pub fn clear_dark_reference(&mut self) {
        self.references.dark = None;
    }

    /// Point the head at the white standard, then call this.
    pub async fn take_light_reference(&mut self) -> Result<(), SpectroError> {
        let values = self.reference_scan().await?;
        info!(integration_us = self.integration_us, "Light reference taken");
        self.references.light = Some(values);
        Ok(())
    }

    pub fn clear_light_reference(&mut self) {
        self.references.light = None;
    }

    /// Mark extra pixels as hot, store the list on the head and rebuild the table.
    pub async fn add_hot_pixels(&mut self, pixels: &[u16]) -> Result<(), SpectroError> {
        if let Some(bad) = pixels.iter().find(|&&p| p as usize > MAX_PIXEL_INDEX) {
            return Err(SpectroError::InvalidSetting(format!(
                "pixel {} is outside 0..={}",
                bad, MAX_PIXEL_INDEX
            )));
        }
        let mut merged = self.hot_pixels.clone();
        merged.extend(pixels.iter().copied());
        if merged.len() > MAX_HOT_PIXELS {
            return Err(SpectroError::InvalidSetting(format!(
                "{} hot pixels, device stores at most {}",
                merged.len(),
                MAX_HOT_PIXELS
            )));
        }
        self.replace_hot_pixels(merged).await
    }

    pub async fn clear_hot_pixels(&mut self) -> Result<(), SpectroError> {
        self.replace_hot_pixels(BTreeSet::new()).await
    }

    async fn replace_hot_pixels(&mut self, pixels: BTreeSet<u16>) -> Result<(), SpectroError> {
        let table = derive_wavelength_table(&self.coefficients, &pixels, self.table.grid())?;
        let list: Vec<u16> = pixels.iter().copied().collect();
        self.link.set_hot_pixels(&list).await?;
        info!(count = list.len(), "Hot pixel list updated");
        self.hot_pixels = pixels;
        self.table = table;
        Ok(())
    }

    /// Scan under the reference lamp, in counts, for [`Instrument::calibrate_from_lamp`].
    pub async fn take_calibration_scan(&mut self) -> Result<Spectrum, SpectroError> {
        let mut stop = never_stopped();
        let Some(mut counts) = self.read_counts(&mut stop).await? else {
            return Err(SpectroError::Cancelled);
        };
        if self.auto_integration() {
            if let Some(settled) = self.auto_adjust(counts.clone(), &mut stop).await? {
                counts = settled;
            }
        }
        self.correct_with(&counts, false, IrradianceUnit::Counts).await
    }

    /// Compute irradiance ratios from a lamp table and a calibration scan,
    /// upload them and use them from now on.
    pub async fn calibrate_from_lamp(&mut self, lamp: &LampTable, scan: &Spectrum) -> Result<(), SpectroError> {
        let calibration = compute_calibration(lamp, &self.table.grid(), &scan.values, scan.integration_us)?;
        self.link.set_irradiance_calibration(Some(&calibration)).await?;
        info!(
            points = calibration.ratios.len(),
            reference_integration_us = calibration.reference_integration_us,
            "Irradiance calibration stored"
        );
        self.calibration = Some(calibration);
        Ok(())
    }

    pub async fn clear_irradiance_calibration(&mut self) -> Result<(), SpectroError> {
        self.link.set_irradiance_calibration(None).await?;
        self.calibration = None;
        Ok(())
    }
}
