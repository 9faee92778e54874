//! Common test utilities and shared imports

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#![allow(dead_code)]

#[allow(unused_imports)]
pub use bytes::Bytes;
#[allow(unused_imports)]
pub use spectrovision_lib::constants::{FLAG_NACK, PIXEL_COUNT};
#[allow(unused_imports)]
pub use spectrovision_lib::error::{CommError, SpectroError};
#[allow(unused_imports)]
pub use spectrovision_lib::settings::{AcquisitionSettings, DeviceConfig, IntegrationMode, PlotMode};
#[allow(unused_imports)]
pub use spectrovision_lib::{Identity, Instrument, Opcode};

use spectrovision_lib::frame;
use spectrovision_lib::transport::BulkPipe;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// VIS head, ~0.55 nm per pixel from 300 nm.
pub const VIS_COEFFICIENTS: [f32; 4] = [300.0, 0.55, -2.0e-5, 1.0e-9];
/// NIR head, intercept above 600 nm.
pub const NIR_COEFFICIENTS: [f32; 4] = [620.0, 0.5, -1.0e-5, 0.0];
pub const HEAD_TEMPERATURE: f32 = 25.0;

/// What the simulated detector sees.
#[derive(Debug, Clone)]
pub enum Scene {
    /// Same count on every pixel regardless of exposure.
    Flat(u16),
    /// `floor + rate · integration`, clipped at the ADC maximum.
    Proportional { floor: u16, counts_per_us: f64 },
    /// Exactly these samples, however many there are.
    Samples(Vec<u16>),
}

impl Scene {
    fn render(&self, integration_us: u32) -> Vec<u16> {
        match self {
            Scene::Flat(value) => vec![*value; PIXEL_COUNT],
            Scene::Proportional { floor, counts_per_us } => {
                let value = (f64::from(*floor) + counts_per_us * f64::from(integration_us)).min(16_384.0);
                vec![value as u16; PIXEL_COUNT]
            }
            Scene::Samples(samples) => samples.clone(),
        }
    }
}

#[derive(Debug)]
pub struct HeadState {
    pub serial: String,
    pub alias: Option<String>,
    pub coefficients: [f32; 4],
    pub hot_pixels: Vec<u16>,
    pub calibration: Option<Vec<f32>>,
    pub temperature: f32,
    pub integration_us: u32,
    pub scans_to_average: u16,
    pub baud_rate: u32,
    pub scene: Scene,
    /// Bytes waiting on the IN endpoint.
    pub pending: VecDeque<u8>,
    /// Every opcode written, in order.
    pub requests: Vec<u32>,
    /// Raw bytes of the last accepted write.
    pub last_frame: Vec<u8>,
    /// Upcoming reads that return nothing.
    pub dropped_reads: usize,
    /// Upcoming writes that accept nothing.
    pub refused_writes: usize,
}

/// A spectroradiometer living in memory, speaking the real frame format.
#[derive(Clone)]
pub struct SimulatedHead {
    state: Arc<Mutex<HeadState>>,
}

impl SimulatedHead {
    pub fn new(coefficients: [f32; 4], scene: Scene) -> Self {
        Self {
            state: Arc::new(Mutex::new(HeadState {
                serial: "SV0042X1".to_string(),
                alias: None,
                coefficients,
                hot_pixels: Vec::new(),
                calibration: None,
                temperature: HEAD_TEMPERATURE,
                integration_us: 0,
                scans_to_average: 1,
                baud_rate: 115_200,
                scene,
                pending: VecDeque::new(),
                requests: Vec::new(),
                last_frame: Vec::new(),
                dropped_reads: 0,
                refused_writes: 0,
            })),
        }
    }

    pub fn vis(scene: Scene) -> Self {
        Self::new(VIS_COEFFICIENTS, scene)
    }

    pub fn nir(scene: Scene) -> Self {
        Self::new(NIR_COEFFICIENTS, scene)
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut HeadState) -> R) -> R {
        f(&mut self.state.lock().expect("head state poisoned"))
    }

    pub fn set_scene(&self, scene: Scene) {
        self.with(|s| s.scene = scene);
    }

    pub fn requests(&self) -> Vec<u32> {
        self.with(|s| s.requests.clone())
    }

    pub fn count_requests(&self, opcode: Opcode) -> usize {
        self.requests().into_iter().filter(|&o| o == u32::from(opcode)).count()
    }

    pub fn inject_stale(&self, bytes: &[u8]) {
        self.with(|s| s.pending.extend(bytes.iter().copied()));
    }

    fn respond(state: &mut HeadState, opcode: Opcode, flags: u16, payload: &[u8]) {
        let raw = frame::encode_response(opcode.into(), flags, payload).expect("encodable response");
        state.pending.extend(raw.iter().copied());
    }

    fn handle(state: &mut HeadState, raw: &[u8]) {
        let request = frame::decode(raw).expect("client sent a valid frame");
        state.requests.push(request.opcode());
        let payload = request.payload().cloned().unwrap_or_default();
        let Ok(opcode) = Opcode::try_from(request.opcode()) else {
            return;
        };
        match opcode {
            Opcode::Reset => {}
            Opcode::GetSerialNumberLength => {
                let len = [state.serial.len() as u8];
                Self::respond(state, opcode, 0, &len);
            }
            Opcode::GetSerialNumber => {
                let serial = state.serial.clone().into_bytes();
                Self::respond(state, opcode, 0, &serial);
            }
            Opcode::GetAlias => match state.alias.clone() {
                Some(alias) => Self::respond(state, opcode, 0, alias.as_bytes()),
                None => Self::respond(state, opcode, FLAG_NACK, &[]),
            },
            Opcode::SetAlias => {
                let alias = String::from_utf8_lossy(&payload).into_owned();
                state.alias = (!alias.is_empty()).then_some(alias);
            }
            Opcode::GetBaudRate => {
                let baud = state.baud_rate.to_le_bytes();
                Self::respond(state, opcode, 0, &baud);
            }
            Opcode::SetBaudRate => state.baud_rate = u32::from_le_bytes(payload[..4].try_into().unwrap()),
            Opcode::GetSpectrum => {
                let counts: Vec<u8> = state
                    .scene
                    .render(state.integration_us)
                    .iter()
                    .flat_map(|c| c.to_le_bytes())
                    .collect();
                Self::respond(state, opcode, 0, &counts);
            }
            Opcode::SetIntegrationTime => {
                state.integration_us = u32::from_le_bytes(payload[..4].try_into().unwrap());
            }
            Opcode::GetScansToAverage => {
                let scans = state.scans_to_average.to_le_bytes();
                Self::respond(state, opcode, 0, &scans);
            }
            Opcode::SetScansToAverage => {
                state.scans_to_average = u16::from_le_bytes(payload[..2].try_into().unwrap());
            }
            Opcode::GetWavelengthCoefficient => {
                let coeff = state.coefficients[payload[0] as usize].to_le_bytes();
                Self::respond(state, opcode, 0, &coeff);
            }
            Opcode::SetWavelengthCoefficient => {
                state.coefficients[payload[0] as usize] = f32::from_le_bytes(payload[1..5].try_into().unwrap());
            }
            Opcode::GetIrradianceCalibration => match state.calibration.clone() {
                Some(floats) => {
                    let raw: Vec<u8> = floats.iter().flat_map(|f| f.to_le_bytes()).collect();
                    Self::respond(state, opcode, 0, &raw);
                }
                None => Self::respond(state, opcode, FLAG_NACK, &[]),
            },
            Opcode::SetIrradianceCalibration => {
                state.calibration = (!payload.is_empty()).then(|| {
                    payload
                        .chunks_exact(4)
                        .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
                        .collect()
                });
            }
            Opcode::GetHotPixels => {
                if state.hot_pixels.is_empty() {
                    Self::respond(state, opcode, FLAG_NACK, &[]);
                } else {
                    let raw: Vec<u8> = state.hot_pixels.iter().flat_map(|p| p.to_le_bytes()).collect();
                    Self::respond(state, opcode, 0, &raw);
                }
            }
            Opcode::SetHotPixels => {
                state.hot_pixels = payload
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .collect();
            }
            Opcode::ReadTemperature => {
                let celsius = state.temperature.to_le_bytes();
                Self::respond(state, opcode, 0, &celsius);
            }
        }
    }
}

impl BulkPipe for SimulatedHead {
    async fn bulk_write(&self, data: Vec<u8>) -> Result<usize, SpectroError> {
        let mut state = self.state.lock().expect("head state poisoned");
        if state.refused_writes > 0 {
            state.refused_writes -= 1;
            return Ok(0);
        }
        Self::handle(&mut state, &data);
        let written = data.len();
        state.last_frame = data;
        Ok(written)
    }

    async fn bulk_read(&self, len: usize, _timeout: Duration) -> Result<Vec<u8>, SpectroError> {
        let mut state = self.state.lock().expect("head state poisoned");
        if state.dropped_reads > 0 {
            state.dropped_reads -= 1;
            return Ok(Vec::new());
        }
        let take = len.min(state.pending.len());
        Ok(state.pending.drain(..take).collect())
    }
}

/// Settings with auto-integration off at the given period.
pub fn manual(micros: u32) -> AcquisitionSettings {
    AcquisitionSettings {
        integration: IntegrationMode::Manual { micros },
        ..Default::default()
    }
}

/// Route library logs to the test harness. `RUST_LOG=debug` shows frame dumps.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Run the connect handshake against a simulated head.
pub async fn connect(head: &SimulatedHead) -> Instrument<SimulatedHead> {
    init_tracing();
    let identity = Identity {
        serial_number: Some("SV0042X1".to_string()),
        alias: None,
    };
    Instrument::from_pipe(head.clone(), DeviceConfig::default(), identity)
        .await
        .expect("handshake succeeds")
}

/// Dark floor plus temperature offset at the simulated head temperature.
pub fn floor_offset() -> f64 {
    spectrovision_lib::constants::DARK_FLOOR_COUNTS
        + spectrovision_lib::settings::TemperatureCompensation::default().offset(f64::from(HEAD_TEMPERATURE))
}
