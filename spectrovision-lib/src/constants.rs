// Protocol and sensor constants for the spectroradiometer heads

use std::time::Duration;

/// USB vendor id of the spectral head
pub const VID: u16 = 0x2457;
/// USB product id of the spectral head
pub const PID: u16 = 0x4000;
pub const ENDPOINT_OUT: u8 = 0x01;
pub const ENDPOINT_IN: u8 = 0x81;

/// Size of the fixed request/response header (44 bytes)
pub const HEADER_SIZE: usize = 44;

/// Size of the footer: 16-byte checksum region plus 4-byte end marker
pub const FOOTER_SIZE: usize = 20;

/// Bulk transfers move in multiples of this many bytes
pub const USB_PACKET_SIZE: usize = 64;

/// Capacity of the immediate-data field in the header
pub const IMMEDIATE_CAPACITY: usize = 16;

pub const START_MARKER: [u8; 2] = [0xC1, 0xC0];
pub const END_MARKER: [u8; 4] = [0xC5, 0xC4, 0xC3, 0xC2];
pub const PROTOCOL_VERSION: u16 = 0x1000;
pub const REGARDING_TAG: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];

/// Flag bit set by the device when it has nothing stored for a query
pub const FLAG_NACK: u16 = 0x0008;

/// Number of pixels on the detector
pub const PIXEL_COUNT: usize = 1024;

/// Highest pixel index usable as an interpolation anchor
pub const MAX_PIXEL_INDEX: usize = PIXEL_COUNT - 1;

/// Scans shorter than this are treated as corrupted
pub const MIN_SCAN_SAMPLES: usize = 400;

/// Constant dark floor subtracted from every raw count
pub const DARK_FLOOR_COUNTS: f64 = 1500.0;

/// Raw counts above this value are saturated
pub const SATURATION_COUNTS: u16 = 16383;

/// Auto-integration: peak above this lowers the integration time
pub const TARGET_HIGH: u16 = 16000;
/// Auto-integration: peak the adjustment aims for
pub const TARGET: f64 = 14500.0;
/// Auto-integration: peak below this raises the integration time
pub const TARGET_LOW: u16 = 13000;
/// Auto-integration ceiling, microseconds
pub const MAX_AUTO_INTEGRATION_US: u32 = 2_000_000;
/// Auto-integration floor, microseconds
pub const MIN_AUTO_INTEGRATION_US: u32 = 1_000;
/// Integration used when the scan is heavily saturated, microseconds
pub const SATURATED_INTEGRATION_US: u32 = 3_000;
/// Maximum number of integration adjustments per acquisition
pub const MAX_AUTO_ITERATIONS: usize = 3;

/// Smallest integration period the firmware accepts, microseconds
pub const MIN_INTEGRATION_US: u32 = 10;
/// Integration period applied right after connecting, microseconds
pub const DEFAULT_INTEGRATION_US: u32 = 10_000;

pub const MAX_SCANS_TO_AVERAGE: u16 = 5000;

/// Hot-pixel list capacity in firmware
pub const MAX_HOT_PIXELS: usize = 58;

/// Converts W·m⁻²·nm⁻¹ times wavelength (nm) into µmol·m⁻²·s⁻¹·nm⁻¹
pub const PHOTON_CONVERSION_FACTOR: f64 = 1.0 / (6.022_141_50e23 * 6.626_093_0e-34 * 299_792_458.0 * 1000.0);

pub const LUX_MULTIPLIER: f64 = 638.002;
pub const LUX_TO_FOOTCANDLES: f64 = 1.0 / 10.7693;

pub const WRITE_TIMEOUT: Duration = Duration::from_secs(1);
/// Added on top of the integration time when waiting for a response
pub const READ_TIMEOUT_MARGIN: Duration = Duration::from_millis(500);
/// Added on top of integration × averaging before collecting a spectrum
pub const SETTLE_MARGIN: Duration = Duration::from_millis(10);
/// Granularity of cancellable waits
pub const SETTLE_SLICE: Duration = Duration::from_millis(10);
pub const FLUSH_TIMEOUT: Duration = Duration::from_millis(20);
pub const FLUSH_MAX_READS: usize = 8;
pub const FLUSH_READ_SIZE: usize = 4096;
/// Follow-up reads allowed while collecting a declared bulk payload
pub const MAX_FOLLOW_UP_READS: usize = 2;
