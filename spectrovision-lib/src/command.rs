//! Command catalog: logical operations mapped to opcodes and payload shapes.
//!
//! Floats cross the wire as 4-byte little-endian IEEE-754 and integers are
//! always least-significant byte first. Coefficients, irradiance ratios and
//! hot-pixel lists may need the bulk section; everything else fits in the
//! 16-byte immediate field.

use crate::constants::{IMMEDIATE_CAPACITY, MAX_HOT_PIXELS, MAX_SCANS_TO_AVERAGE, MIN_INTEGRATION_US, MIN_SCAN_SAMPLES};
use crate::error::{CommError, SpectroError};
use crate::frame::{self, Frame};
use crate::transport::{BulkPipe, Transport};
use bytes::{Buf, Bytes};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::sync::Arc;
use std::time::Duration;
use strum_macros::Display;
use tracing::{debug, info, warn};

/// Message types understood by the spectral head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum Opcode {
    Reset = 0x0000_0000,
    GetSerialNumber = 0x0000_0100,
    GetSerialNumberLength = 0x0000_0101,
    GetAlias = 0x0000_0200,
    SetAlias = 0x0000_0210,
    GetBaudRate = 0x0000_0800,
    SetBaudRate = 0x0000_0810,
    GetSpectrum = 0x0010_1000,
    SetIntegrationTime = 0x0011_0010,
    GetScansToAverage = 0x0012_0000,
    SetScansToAverage = 0x0012_0010,
    GetWavelengthCoefficient = 0x0018_0101,
    SetWavelengthCoefficient = 0x0018_0111,
    GetIrradianceCalibration = 0x0018_2001,
    SetIrradianceCalibration = 0x0018_2011,
    GetHotPixels = 0x0018_6000,
    SetHotPixels = 0x0018_6010,
    ReadTemperature = 0x0040_0001,
}

/// Stored irradiance calibration: the integration time it was taken at and
/// one ratio per output wavelength.
#[derive(Debug, Clone, PartialEq)]
pub struct IrradianceCalibration {
    pub reference_integration_us: f64,
    pub ratios: Vec<f64>,
}

impl IrradianceCalibration {
    /// Wire form: reference integration followed by the ratios, all f32.
    pub fn to_floats(&self) -> Vec<f32> {
        std::iter::once(self.reference_integration_us)
            .chain(self.ratios.iter().copied())
            .map(|v| v as f32)
            .collect()
    }

    pub fn from_floats(values: &[f32]) -> Option<Self> {
        let (&reference, ratios) = values.split_first()?;
        Some(Self {
            reference_integration_us: reference as f64,
            ratios: ratios.iter().map(|&r| r as f64).collect(),
        })
    }
}

/// Cloneable handle issuing catalog commands over a shared transport.
///
/// Every method is one request/response pair, except the spectrum which is
/// split into [`DeviceLink::start_measurement`] and
/// [`DeviceLink::acquire_measurement`] so several heads can be triggered
/// back to back before any of them is read.
pub struct DeviceLink<P: BulkPipe> {
    transport: Arc<Transport<P>>,
}

impl<P: BulkPipe> Clone for DeviceLink<P> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

const QUERY_WAIT: Duration = Duration::ZERO;

impl<P: BulkPipe> DeviceLink<P> {
    pub fn new(pipe: P) -> Self {
        Self {
            transport: Arc::new(Transport::new(pipe)),
        }
    }

    pub fn transport(&self) -> &Transport<P> {
        &self.transport
    }

    async fn send(&self, opcode: Opcode, payload: &[u8]) -> Result<(), SpectroError> {
        let raw = frame::encode_payload(opcode.into(), payload)?;
        self.transport.write(raw).await
    }

    /// Write a request and read its reply. A reply to some other opcode is
    /// stale: the endpoint is flushed and the request issued once more.
    async fn query(&self, opcode: Opcode, payload: &[u8]) -> Result<Frame, SpectroError> {
        let raw = frame::encode_payload(opcode.into(), payload)?;
        let exchange = self.transport.try_begin()?;
        for attempt in 0..2 {
            exchange.write(raw.clone()).await?;
            let response = exchange.read(QUERY_WAIT).await?;
            if response.opcode() == u32::from(opcode) {
                return Ok(response);
            }
            let drained = exchange.flush().await;
            warn!(
                expected = %opcode,
                got = response.opcode(),
                drained,
                attempt,
                "Stale reply discarded"
            );
        }
        Err(SpectroError::Protocol(format!("no matching reply to {}", opcode)))
    }

    /// Query whose reply must carry a payload.
    async fn query_payload(&self, opcode: Opcode, payload: &[u8]) -> Result<Bytes, SpectroError> {
        let response = self.query(opcode, payload).await?;
        response.payload().cloned().ok_or_else(|| {
            CommError::UnexpectedPayload {
                command: opcode_name(opcode),
                detail: "reply carried no data".to_string(),
            }
            .into()
        })
    }

    /// Query whose reply may be a NACK meaning "nothing stored".
    async fn query_optional(&self, opcode: Opcode) -> Result<Option<Bytes>, SpectroError> {
        let response = self.query(opcode, &[]).await?;
        if response.is_nack() {
            debug!(%opcode, "Device has nothing stored");
            return Ok(None);
        }
        Ok(response.payload().cloned())
    }

    pub async fn reset(&self) -> Result<(), SpectroError> {
        info!("Resetting spectroradiometer");
        self.send(Opcode::Reset, &[]).await
    }

    pub async fn get_serial_number(&self) -> Result<String, SpectroError> {
        let length = self.query_payload(Opcode::GetSerialNumberLength, &[]).await?;
        let declared = *length.first().ok_or(CommError::NoResponse)? as usize;
        let serial = self.query_payload(Opcode::GetSerialNumber, &[]).await?;
        let text = trim_nul(&serial);
        if text.len() != declared {
            return Err(CommError::SerialLength {
                declared,
                actual: text.len(),
            }
            .into());
        }
        Ok(text)
    }

    /// User-defined name, e.g. a station number. `None` when unset.
    pub async fn get_alias(&self) -> Result<Option<String>, SpectroError> {
        Ok(self
            .query_optional(Opcode::GetAlias)
            .await?
            .map(|raw| trim_nul(&raw))
            .filter(|alias| !alias.is_empty()))
    }

    /// An empty alias deletes it.
    pub async fn set_alias(&self, alias: &str) -> Result<(), SpectroError> {
        if alias.len() > IMMEDIATE_CAPACITY {
            return Err(SpectroError::InvalidSetting(format!(
                "alias is {} bytes, limit is {}",
                alias.len(),
                IMMEDIATE_CAPACITY
            )));
        }
        let raw = frame::encode(Opcode::SetAlias.into(), Some(alias.as_bytes()), None)?;
        self.transport.write(raw).await
    }

    pub async fn get_baud_rate(&self) -> Result<u32, SpectroError> {
        let mut raw = self.query_payload(Opcode::GetBaudRate, &[]).await?;
        expect_len(Opcode::GetBaudRate, &raw, 4)?;
        Ok(raw.get_u32_le())
    }

    pub async fn set_baud_rate(&self, baud: u32) -> Result<(), SpectroError> {
        self.send(Opcode::SetBaudRate, &baud.to_le_bytes()).await
    }

    /// No reply. The firmware minimum is 10 µs.
    pub async fn set_integration_time(&self, micros: u32) -> Result<(), SpectroError> {
        if micros < MIN_INTEGRATION_US {
            return Err(SpectroError::InvalidSetting(format!(
                "integration time {} µs is below the {} µs minimum",
                micros, MIN_INTEGRATION_US
            )));
        }
        debug!(micros, "Setting integration time");
        self.send(Opcode::SetIntegrationTime, &micros.to_le_bytes()).await
    }

    pub async fn get_scans_to_average(&self) -> Result<u16, SpectroError> {
        let mut raw = self.query_payload(Opcode::GetScansToAverage, &[]).await?;
        expect_len(Opcode::GetScansToAverage, &raw, 2)?;
        Ok(raw.get_u16_le())
    }

    pub async fn set_scans_to_average(&self, scans: u16) -> Result<(), SpectroError> {
        if !(1..=MAX_SCANS_TO_AVERAGE).contains(&scans) {
            return Err(SpectroError::InvalidSetting(format!(
                "scans to average must be 1..={}, got {}",
                MAX_SCANS_TO_AVERAGE, scans
            )));
        }
        self.send(Opcode::SetScansToAverage, &scans.to_le_bytes()).await
    }

    pub async fn get_wavelength_coefficient(&self, index: u8) -> Result<f32, SpectroError> {
        let mut raw = self.query_payload(Opcode::GetWavelengthCoefficient, &[index]).await?;
        expect_len(Opcode::GetWavelengthCoefficient, &raw, 4)?;
        Ok(raw.get_f32_le())
    }

    /// The four pixel→wavelength polynomial coefficients, intercept first.
    pub async fn get_wavelength_coefficients(&self) -> Result<[f32; 4], SpectroError> {
        let mut coeffs = [0.0f32; 4];
        for (index, coeff) in coeffs.iter_mut().enumerate() {
            *coeff = self.get_wavelength_coefficient(index as u8).await?;
        }
        Ok(coeffs)
    }

    pub async fn set_wavelength_coefficients(&self, coeffs: [f32; 4]) -> Result<(), SpectroError> {
        for (index, coeff) in coeffs.iter().enumerate() {
            let mut payload = [0u8; 5];
            payload[0] = index as u8;
            payload[1..].copy_from_slice(&coeff.to_le_bytes());
            self.send(Opcode::SetWavelengthCoefficient, &payload).await?;
        }
        Ok(())
    }

    /// `None` when no calibration has been stored.
    pub async fn get_irradiance_calibration(&self) -> Result<Option<IrradianceCalibration>, SpectroError> {
        let Some(raw) = self.query_optional(Opcode::GetIrradianceCalibration).await? else {
            return Ok(None);
        };
        if raw.len() % 4 != 0 {
            return Err(CommError::UnexpectedPayload {
                command: opcode_name(Opcode::GetIrradianceCalibration),
                detail: format!("{} bytes is not a whole number of floats", raw.len()),
            }
            .into());
        }
        let floats: Vec<f32> = raw
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(IrradianceCalibration::from_floats(&floats))
    }

    /// Sending no ratios deletes the stored calibration.
    pub async fn set_irradiance_calibration(&self, calibration: Option<&IrradianceCalibration>) -> Result<(), SpectroError> {
        let payload: Vec<u8> = calibration
            .map(IrradianceCalibration::to_floats)
            .unwrap_or_default()
            .iter()
            .flat_map(|f| f.to_le_bytes())
            .collect();
        let bulk = if payload.is_empty() { None } else { Some(payload.as_slice()) };
        let raw = frame::encode(Opcode::SetIrradianceCalibration.into(), None, bulk)?;
        self.transport.write(raw).await
    }

    /// Empty when the device has no hot pixels recorded.
    pub async fn get_hot_pixels(&self) -> Result<Vec<u16>, SpectroError> {
        let raw = self.query_optional(Opcode::GetHotPixels).await?.unwrap_or_default();
        Ok(raw.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect())
    }

    pub async fn set_hot_pixels(&self, pixels: &[u16]) -> Result<(), SpectroError> {
        if pixels.len() > MAX_HOT_PIXELS {
            return Err(SpectroError::InvalidSetting(format!(
                "{} hot pixels given, device stores at most {}",
                pixels.len(),
                MAX_HOT_PIXELS
            )));
        }
        let payload: Vec<u8> = pixels.iter().flat_map(|p| p.to_le_bytes()).collect();
        self.send(Opcode::SetHotPixels, &payload).await
    }

    /// Internal temperature in °C (raw counts on uncalibrated heads).
    pub async fn read_temperature(&self) -> Result<f32, SpectroError> {
        let mut raw = self.query_payload(Opcode::ReadTemperature, &[0]).await?;
        expect_len(Opcode::ReadTemperature, &raw, 4)?;
        Ok(raw.get_f32_le())
    }

    /// Trigger a spectrum without waiting for it.
    pub async fn start_measurement(&self) -> Result<(), SpectroError> {
        self.send(Opcode::GetSpectrum, &[]).await
    }

    /// Collect the spectrum requested by [`DeviceLink::start_measurement`].
    ///
    /// Pixels arrive LSB first. A scan shorter than the minimum sample
    /// count is rejected after flushing the IN endpoint.
    pub async fn acquire_measurement(&self, integration: Duration) -> Result<Vec<u16>, SpectroError> {
        let exchange = self.transport.try_begin()?;
        let response = exchange.read(integration).await?;
        let counts = response
            .payload()
            .map(|raw| parse_counts(raw))
            .unwrap_or_default();
        if counts.len() < MIN_SCAN_SAMPLES {
            exchange.flush().await;
            return Err(CommError::CorruptedScan {
                samples: counts.len(),
                minimum: MIN_SCAN_SAMPLES,
            }
            .into());
        }
        Ok(counts)
    }

    /// Collect and drop a triggered scan that will not be used, then drain
    /// the IN endpoint so the next exchange starts clean.
    pub async fn discard_measurement(&self, integration: Duration) -> Result<(), SpectroError> {
        let exchange = self.transport.try_begin()?;
        let pending = exchange.read(integration).await;
        let drained = exchange.flush().await;
        match pending {
            Ok(frame) => debug!(opcode = frame.opcode(), drained, "Discarded triggered scan"),
            Err(e) => debug!(error = %e, drained, "No triggered scan to discard"),
        }
        Ok(())
    }
}

/// Reassemble LSB/MSB byte pairs into pixel counts.
pub fn parse_counts(raw: &[u8]) -> Vec<u16> {
    raw.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect()
}

fn trim_nul(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

fn expect_len(opcode: Opcode, raw: &Bytes, len: usize) -> Result<(), SpectroError> {
    if raw.len() < len {
        return Err(CommError::UnexpectedPayload {
            command: opcode_name(opcode),
            detail: format!("expected {} bytes, got {}", len, raw.len()),
        }
        .into());
    }
    Ok(())
}

fn opcode_name(opcode: Opcode) -> &'static str {
    match opcode {
        Opcode::Reset => "reset",
        Opcode::GetSerialNumber => "get serial number",
        Opcode::GetSerialNumberLength => "get serial number length",
        Opcode::GetAlias => "get alias",
        Opcode::SetAlias => "set alias",
        Opcode::GetBaudRate => "get baud rate",
        Opcode::SetBaudRate => "set baud rate",
        Opcode::GetSpectrum => "get spectrum",
        Opcode::SetIntegrationTime => "set integration time",
        Opcode::GetScansToAverage => "get scans to average",
        Opcode::SetScansToAverage => "set scans to average",
        Opcode::GetWavelengthCoefficient => "get wavelength coefficient",
        Opcode::SetWavelengthCoefficient => "set wavelength coefficient",
        Opcode::GetIrradianceCalibration => "get irradiance calibration",
        Opcode::SetIrradianceCalibration => "set irradiance calibration",
        Opcode::GetHotPixels => "get hot pixels",
        Opcode::SetHotPixels => "set hot pixels",
        Opcode::ReadTemperature => "read temperature",
    }
}
