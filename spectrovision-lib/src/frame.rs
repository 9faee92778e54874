//! # Request/response frame codec
//!
//! Every exchange with the spectral head is one frame:
//!
//! ```text
//! 0      start marker        c1 c0
//! 2      protocol version    00 10
//! 4      flags               u16 LE
//! 6      error code          u16 LE
//! 8      message type        u32 LE (opcode)
//! 12     regarding           de ad be ef
//! 16     reserved            6 bytes
//! 22     checksum type       0 (none)
//! 23     immediate length    0..=16
//! 24     immediate data      16 bytes
//! 40     bytes remaining     u32 LE, bulk payload + footer
//! 44     bulk payload        optional
//! ..     checksum            16 bytes, unused
//! ..     end marker          c5 c4 c3 c2
//! ```
//!
//! Payloads of up to 16 bytes ride in the immediate field. Larger ones follow
//! the header, and the encoded buffer is zero-padded to a multiple of 64 bytes
//! so it can be pushed as whole USB packets.

use crate::constants::{
    END_MARKER, FLAG_NACK, FOOTER_SIZE, HEADER_SIZE, IMMEDIATE_CAPACITY, PROTOCOL_VERSION, REGARDING_TAG,
    START_MARKER, USB_PACKET_SIZE,
};
use crate::error::SpectroError;
use bytes::{BufMut, Bytes, BytesMut};
use zerocopy::byteorder::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct FrameHeader {
    pub start: [u8; 2],
    pub protocol_version: U16,
    pub flags: U16,
    pub error_code: U16,
    pub message_type: U32,
    pub regarding: [u8; 4],
    pub reserved: [u8; 6],
    pub checksum_type: u8,
    pub immediate_length: u8,
    pub immediate: [u8; IMMEDIATE_CAPACITY],
    pub bytes_remaining: U32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct FrameFooter {
    pub checksum: [u8; 16],
    pub end: [u8; 4],
}

impl FrameHeader {
    fn request(opcode: u32) -> Self {
        Self {
            start: START_MARKER,
            protocol_version: U16::new(PROTOCOL_VERSION),
            flags: U16::new(0),
            error_code: U16::new(0),
            message_type: U32::new(opcode),
            regarding: REGARDING_TAG,
            reserved: [0; 6],
            checksum_type: 0,
            immediate_length: 0,
            immediate: [0; IMMEDIATE_CAPACITY],
            bytes_remaining: U32::new(FOOTER_SIZE as u32),
        }
    }

    /// Bytes the frame declares beyond header and footer, i.e. the bulk payload length.
    pub fn bulk_length(&self) -> Result<usize, SpectroError> {
        let remaining = self.bytes_remaining.get() as usize;
        remaining.checked_sub(FOOTER_SIZE).ok_or_else(|| {
            SpectroError::Protocol(format!(
                "bytes remaining {} is smaller than the {} byte footer",
                remaining, FOOTER_SIZE
            ))
        })
    }
}

impl Default for FrameFooter {
    fn default() -> Self {
        Self {
            checksum: [0; 16],
            end: END_MARKER,
        }
    }
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub header: FrameHeader,
    pub immediate: Option<Bytes>,
    pub bulk: Option<Bytes>,
}

impl Frame {
    pub fn opcode(&self) -> u32 {
        self.header.message_type.get()
    }

    pub fn flags(&self) -> u16 {
        self.header.flags.get()
    }

    pub fn error_code(&self) -> u16 {
        self.header.error_code.get()
    }

    /// The device had nothing stored for the query.
    pub fn is_nack(&self) -> bool {
        self.flags() & FLAG_NACK != 0
    }

    /// Bulk payload if present, otherwise the immediate data.
    pub fn payload(&self) -> Option<&Bytes> {
        self.bulk.as_ref().or(self.immediate.as_ref())
    }
}

/// Round a byte count up to whole USB packets.
pub fn round_up_to_packet(len: usize) -> usize {
    len.div_ceil(USB_PACKET_SIZE) * USB_PACKET_SIZE
}

/// Encode a frame with explicit immediate and bulk sections.
pub fn encode(opcode: u32, immediate: Option<&[u8]>, bulk: Option<&[u8]>) -> Result<Bytes, SpectroError> {
    let mut header = FrameHeader::request(opcode);

    if let Some(data) = immediate {
        if data.len() > IMMEDIATE_CAPACITY {
            return Err(SpectroError::Protocol(format!(
                "immediate data is {} bytes, limit is {}",
                data.len(),
                IMMEDIATE_CAPACITY
            )));
        }
        header.immediate_length = data.len() as u8;
        header.immediate[..data.len()].copy_from_slice(data);
    }

    let bulk = bulk.unwrap_or_default();
    let remaining = u32::try_from(bulk.len() + FOOTER_SIZE)
        .map_err(|_| SpectroError::Protocol(format!("bulk payload of {} bytes is too large", bulk.len())))?;
    header.bytes_remaining = U32::new(remaining);

    let frame_len = HEADER_SIZE + bulk.len() + FOOTER_SIZE;
    let mut buf = BytesMut::with_capacity(round_up_to_packet(frame_len));
    buf.extend_from_slice(header.as_bytes());
    buf.extend_from_slice(bulk);
    buf.extend_from_slice(FrameFooter::default().as_bytes());
    buf.put_bytes(0, round_up_to_packet(frame_len) - frame_len);
    Ok(buf.freeze())
}

/// Encode a request, placing the payload wherever it fits.
pub fn encode_payload(opcode: u32, payload: &[u8]) -> Result<Bytes, SpectroError> {
    if payload.is_empty() {
        encode(opcode, None, None)
    } else if payload.len() <= IMMEDIATE_CAPACITY {
        encode(opcode, Some(payload), None)
    } else {
        encode(opcode, None, Some(payload))
    }
}

/// Parse just the header out of the first chunk of a response.
pub fn decode_header(raw: &[u8]) -> Result<FrameHeader, SpectroError> {
    if raw.len() < HEADER_SIZE {
        return Err(SpectroError::Protocol(format!(
            "frame too short: {} bytes, header needs {}",
            raw.len(),
            HEADER_SIZE
        )));
    }
    let header = FrameHeader::read_from_bytes(&raw[..HEADER_SIZE])
        .map_err(|_| SpectroError::Protocol("Failed to parse frame header".to_string()))?;
    if header.start != START_MARKER {
        return Err(SpectroError::Protocol(format!(
            "bad start marker {}",
            hex::encode(header.start)
        )));
    }
    if header.immediate_length as usize > IMMEDIATE_CAPACITY {
        return Err(SpectroError::Protocol(format!(
            "immediate length {} exceeds {}",
            header.immediate_length, IMMEDIATE_CAPACITY
        )));
    }
    Ok(header)
}

/// Decode a complete frame. Trailing padding past the end marker is ignored.
pub fn decode(raw: &[u8]) -> Result<Frame, SpectroError> {
    let header = decode_header(raw)?;
    let bulk_len = header.bulk_length()?;
    let needed = HEADER_SIZE + bulk_len + FOOTER_SIZE;
    if raw.len() < needed {
        return Err(SpectroError::Protocol(format!(
            "frame declares {} bytes, only {} available",
            needed,
            raw.len()
        )));
    }

    let footer_start = HEADER_SIZE + bulk_len;
    let footer = FrameFooter::read_from_bytes(&raw[footer_start..needed])
        .map_err(|_| SpectroError::Protocol("Failed to parse frame footer".to_string()))?;
    if footer.end != END_MARKER {
        return Err(SpectroError::Protocol(format!(
            "bad end marker {}",
            hex::encode(footer.end)
        )));
    }

    let immediate = match header.immediate_length as usize {
        0 => None,
        n => Some(Bytes::copy_from_slice(&header.immediate[..n])),
    };
    let bulk = match bulk_len {
        0 => None,
        _ => Some(Bytes::copy_from_slice(&raw[HEADER_SIZE..footer_start])),
    };

    Ok(Frame {
        header,
        immediate,
        bulk,
    })
}

/// Build a device-side response. Used by simulators and tests.
pub fn encode_response(opcode: u32, flags: u16, payload: &[u8]) -> Result<Bytes, SpectroError> {
    let mut raw = BytesMut::from(encode_payload(opcode, payload)?.as_ref());
    raw[4..6].copy_from_slice(&flags.to_le_bytes());
    Ok(raw.freeze())
}
