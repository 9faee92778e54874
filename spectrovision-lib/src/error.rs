use thiserror::Error;

/// The primary error type for the `spectrovision-lib` library.
#[derive(Error, Debug)]
pub enum SpectroError {
    #[error("No spectroradiometer connected. Is the sensor head plugged in?")]
    DeviceNotFound,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Device communication error: {0}")]
    DeviceCommunication(#[from] CommError),

    /// Another transaction holds the device. Not a failure; try again later.
    #[error("Device busy: another transaction is in flight")]
    Busy,

    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error("Acquisition cancelled")]
    Cancelled,
}

/// Why talking to the device failed.
#[derive(Error, Debug)]
pub enum CommError {
    #[error("USB error: {0}")]
    Usb(#[from] nusb::Error),

    #[error("USB transfer error: {0}")]
    Transfer(#[from] nusb::transfer::TransferError),

    #[error("Timeout during USB operation: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),

    #[error("Could not write to device, interface may be blocked. Please reconnect the spectroradiometer.")]
    WriteBlocked,

    #[error("Could not read from device. Try reconnecting the spectroradiometer.")]
    NoResponse,

    #[error("Corrupted scan: received {samples} samples, expected at least {minimum}")]
    CorruptedScan { samples: usize, minimum: usize },

    #[error("Serial number length mismatch: device reported {declared} bytes, sent {actual}")]
    SerialLength { declared: usize, actual: usize },

    #[error("{what} length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Unexpected payload for {command}: {detail}")]
    UnexpectedPayload { command: &'static str, detail: String },
}

impl SpectroError {
    /// True for the one variant that means "retry later".
    pub fn is_busy(&self) -> bool {
        matches!(self, SpectroError::Busy)
    }
}

impl From<nusb::Error> for SpectroError {
    fn from(err: nusb::Error) -> Self {
        SpectroError::DeviceCommunication(CommError::Usb(err))
    }
}

impl From<nusb::transfer::TransferError> for SpectroError {
    fn from(err: nusb::transfer::TransferError) -> Self {
        SpectroError::DeviceCommunication(CommError::Transfer(err))
    }
}

impl From<tokio::time::error::Elapsed> for SpectroError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        SpectroError::DeviceCommunication(CommError::Timeout(err))
    }
}
