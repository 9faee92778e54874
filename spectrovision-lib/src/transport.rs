use crate::constants::{
    ENDPOINT_IN, ENDPOINT_OUT, FLUSH_MAX_READS, FLUSH_READ_SIZE, FLUSH_TIMEOUT, HEADER_SIZE, MAX_FOLLOW_UP_READS,
    READ_TIMEOUT_MARGIN, USB_PACKET_SIZE, WRITE_TIMEOUT,
};
use crate::error::{CommError, SpectroError};
use crate::frame::{self, Frame};
use bytes::{Bytes, BytesMut};
use nusb::{Interface, transfer::RequestBuffer};
use std::future::Future;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, trace, warn};

/// The two bulk endpoints of one device.
///
/// Implemented over nusb for real hardware; tests plug in a simulated head.
pub trait BulkPipe: Send + Sync + 'static {
    /// Push bytes to the OUT endpoint, returning how many were accepted.
    fn bulk_write(&self, data: Vec<u8>) -> impl Future<Output = Result<usize, SpectroError>> + Send;

    /// Read up to `len` bytes from the IN endpoint. An empty buffer means nothing arrived.
    fn bulk_read(&self, len: usize, timeout: Duration) -> impl Future<Output = Result<Vec<u8>, SpectroError>> + Send;
}

/// Bulk endpoints of a claimed nusb interface.
#[derive(Clone)]
pub struct UsbPipe {
    interface: Interface,
}

impl UsbPipe {
    pub fn new(interface: Interface) -> Self {
        Self { interface }
    }
}

impl BulkPipe for UsbPipe {
    async fn bulk_write(&self, data: Vec<u8>) -> Result<usize, SpectroError> {
        let transfer = self.interface.bulk_out(ENDPOINT_OUT, data);
        let completion = tokio::time::timeout(WRITE_TIMEOUT, transfer).await?;
        let written = completion.into_result()?;
        Ok(written.actual_length())
    }

    async fn bulk_read(&self, len: usize, timeout: Duration) -> Result<Vec<u8>, SpectroError> {
        let transfer = self.interface.bulk_in(ENDPOINT_IN, RequestBuffer::new(len));
        let completion = tokio::time::timeout(timeout, transfer).await?;
        Ok(completion.into_result()?)
    }
}

/// Serialises access to one device's endpoints.
///
/// The slot is taken with `try_lock`: a caller that finds it occupied gets
/// [`SpectroError::Busy`] immediately instead of queueing behind the
/// in-flight exchange.
pub struct Transport<P: BulkPipe> {
    pipe: P,
    slot: Mutex<()>,
}

/// Exclusive access to the endpoints for the duration of one exchange.
pub struct Exchange<'a, P: BulkPipe> {
    pipe: &'a P,
    _slot: MutexGuard<'a, ()>,
}

impl<P: BulkPipe> Transport<P> {
    pub fn new(pipe: P) -> Self {
        Self {
            pipe,
            slot: Mutex::new(()),
        }
    }

    /// Take the slot without waiting.
    pub fn try_begin(&self) -> Result<Exchange<'_, P>, SpectroError> {
        let guard = self.slot.try_lock().map_err(|_| SpectroError::Busy)?;
        Ok(Exchange {
            pipe: &self.pipe,
            _slot: guard,
        })
    }

    /// Write one request frame.
    pub async fn write(&self, frame: Bytes) -> Result<(), SpectroError> {
        self.try_begin()?.write(frame).await
    }

    /// Discard whatever is waiting on the IN endpoint.
    pub async fn flush(&self) -> Result<usize, SpectroError> {
        Ok(self.try_begin()?.flush().await)
    }
}

impl<P: BulkPipe> Exchange<'_, P> {
    /// Write a frame, retrying once if the endpoint accepts nothing.
    pub async fn write(&self, frame: Bytes) -> Result<(), SpectroError> {
        debug!(bytes = hex::encode(&frame), "USB Write");
        if self.pipe.bulk_write(frame.to_vec()).await? > 0 {
            return Ok(());
        }
        warn!("Zero-byte write, retrying once");
        if self.pipe.bulk_write(frame.to_vec()).await? > 0 {
            return Ok(());
        }
        Err(CommError::WriteBlocked.into())
    }

    /// Read a response frame, retrying once. After a second failure the IN
    /// endpoint is drained before the error is returned.
    pub async fn read(&self, integration: Duration) -> Result<Frame, SpectroError> {
        match self.read_once(integration).await {
            Ok(frame) => return Ok(frame),
            Err(SpectroError::DeviceCommunication(err)) => {
                warn!(error = %err, "Read failed, retrying once");
            }
            Err(err) => {
                self.flush().await;
                return Err(err);
            }
        }

        match self.read_once(integration).await {
            Ok(frame) => Ok(frame),
            Err(err) => {
                let drained = self.flush().await;
                warn!(error = %err, drained, "Read failed twice, inbound endpoint flushed");
                Err(err)
            }
        }
    }

    async fn read_once(&self, integration: Duration) -> Result<Frame, SpectroError> {
        let timeout = integration + READ_TIMEOUT_MARGIN;
        let first = self.pipe.bulk_read(USB_PACKET_SIZE, timeout).await?;
        if first.len() < HEADER_SIZE {
            trace!(len = first.len(), "Short header read");
            return Err(CommError::NoResponse.into());
        }
        let header = frame::decode_header(&first)?;
        let bulk_len = header.bulk_length()?;

        let mut raw = BytesMut::from(first.as_slice());
        let expected = USB_PACKET_SIZE + bulk_len;
        let mut reads = 0;
        while raw.len() < expected && reads < MAX_FOLLOW_UP_READS {
            let wanted = frame::round_up_to_packet(expected - raw.len());
            let chunk = self.pipe.bulk_read(wanted, timeout).await?;
            if chunk.is_empty() {
                break;
            }
            raw.extend_from_slice(&chunk);
            reads += 1;
        }

        debug!(bytes = hex::encode(&raw[..raw.len().min(USB_PACKET_SIZE)]), total = raw.len(), "USB Read");
        frame::decode(&raw)
    }

    /// Best-effort drain of stale inbound bytes.
    pub async fn flush(&self) -> usize {
        let mut drained = 0;
        for _ in 0..FLUSH_MAX_READS {
            match self.pipe.bulk_read(FLUSH_READ_SIZE, FLUSH_TIMEOUT).await {
                Ok(chunk) if !chunk.is_empty() => drained += chunk.len(),
                _ => break,
            }
        }
        if drained > 0 {
            debug!(drained, "Flushed stale inbound bytes");
        }
        drained
    }
}
