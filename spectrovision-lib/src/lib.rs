pub mod acquisition;
pub mod calibration;
pub mod command;
pub mod constants;
pub mod coordinator;
pub mod correction;
pub mod curves;
pub mod derived;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod instrument;
pub mod settings;
pub mod transport;
pub mod worker;

// Re-export the main types for easy access
pub use command::{DeviceLink, IrradianceCalibration, Opcode};
pub use coordinator::{Coordinator, Measurement};
pub use derived::{Spectrum, Totals};
pub use error::{CommError, SpectroError};
pub use geometry::{SensorFamily, WavelengthGrid};
pub use instrument::{DeviceSummary, Identity, Instrument, list_devices};
pub use settings::{AcquisitionSettings, DeviceConfig, IlluminanceUnit, IntegrationMode, PlotMode};
pub use transport::{BulkPipe, UsbPipe};
pub use worker::{WorkerCommand, WorkerEvent, WorkerHandle};
