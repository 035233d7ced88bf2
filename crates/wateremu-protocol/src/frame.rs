//! Frame encoding/decoding utilities.
//!
//! Both directions use the same layout and differ only in magic:
//!
//! ```text
//! +--------+--------+--------+-------+-------------------+
//! | magic0 | magic1 | length |  cmd  | payload[..]       |
//! +--------+--------+--------+-------+-------------------+
//! ```
//!
//! Each write on the wireless link carries exactly one frame, so the payload
//! is simply everything after the command byte. Byte-stream transports that
//! may merge or split writes go through [`FrameSplitter`] first.

use std::fmt;

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::DecodeError;

/// How the byte in the length position is produced and checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthField {
    /// `length == 1 + payload.len()`, mismatches are rejected.
    Strict,
    /// The byte is a fixed marker, as seen in captured traffic.
    Marker(u8),
}

impl Default for LengthField {
    fn default() -> Self {
        LengthField::Marker(DEFAULT_LENGTH_MARKER)
    }
}

impl LengthField {
    /// The length byte to write for a payload of `payload_len` bytes.
    ///
    /// Under [`LengthField::Strict`] payloads beyond [`MAX_PAYLOAD_LEN`]
    /// saturate at `0xFF`.
    pub fn encode(&self, payload_len: usize) -> u8 {
        match self {
            LengthField::Strict => u8::try_from(1 + payload_len).unwrap_or(u8::MAX),
            LengthField::Marker(marker) => *marker,
        }
    }

    fn check(&self, declared: u8, payload_len: usize) -> Result<(), DecodeError> {
        let expected = match self {
            LengthField::Strict => 1 + payload_len,
            LengthField::Marker(marker) => usize::from(*marker),
        };
        if usize::from(declared) != expected {
            return Err(DecodeError::LengthMismatch { declared, expected });
        }
        Ok(())
    }
}

/// A decoded frame: command (or reply) code plus opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Command code for inbound frames, reply code for outbound ones.
    pub code: u8,
    /// Bytes following the code.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a frame from a code and payload.
    pub fn new(code: u8, payload: impl Into<Vec<u8>>) -> Self {
        Frame {
            code,
            payload: payload.into(),
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X} {}", self.code, hex::encode_upper(&self.payload))
    }
}

/// Encoder/decoder for single frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameCodec {
    length_field: LengthField,
}

impl FrameCodec {
    /// Create a codec with the given length policy.
    pub fn new(length_field: LengthField) -> Self {
        FrameCodec { length_field }
    }

    /// Create a codec that enforces `length == 1 + payload.len()`.
    pub fn strict() -> Self {
        FrameCodec::new(LengthField::Strict)
    }

    /// The active length policy.
    pub fn length_field(&self) -> LengthField {
        self.length_field
    }

    /// Decode a command frame written by the app (`FE FE` magic).
    pub fn decode(&self, raw: &[u8]) -> Result<Frame, DecodeError> {
        self.decode_with_magic(raw, INBOUND_MAGIC)
    }

    /// Decode a reply frame notified by the meter (`FD FD` magic).
    pub fn decode_reply(&self, raw: &[u8]) -> Result<Frame, DecodeError> {
        self.decode_with_magic(raw, OUTBOUND_MAGIC)
    }

    fn decode_with_magic(&self, raw: &[u8], expected: [u8; 2]) -> Result<Frame, DecodeError> {
        if raw.len() < HEADER_LEN {
            return Err(DecodeError::TooShort {
                expected: HEADER_LEN,
                actual: raw.len(),
            });
        }

        let mut buf = raw;
        let magic = [buf.get_u8(), buf.get_u8()];
        if magic != expected {
            return Err(DecodeError::BadMagic {
                expected,
                actual: magic,
            });
        }

        let declared = buf.get_u8();
        let code = buf.get_u8();
        self.length_field.check(declared, buf.remaining())?;

        Ok(Frame::new(code, buf.chunk()))
    }

    /// Encode a reply frame for notification to the app.
    ///
    /// Under [`LengthField::Strict`] the payload must not exceed
    /// [`MAX_PAYLOAD_LEN`]; a longer one produces a frame the strict decoder
    /// rejects.
    pub fn encode(&self, code: u8, payload: &[u8]) -> Vec<u8> {
        debug_assert!(
            self.length_field != LengthField::Strict || payload.len() <= MAX_PAYLOAD_LEN,
            "strict frame payload of {} bytes exceeds {}",
            payload.len(),
            MAX_PAYLOAD_LEN
        );
        let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
        buf.put_slice(&OUTBOUND_MAGIC);
        buf.put_u8(self.length_field.encode(payload.len()));
        buf.put_u8(code);
        buf.put_slice(payload);
        buf
    }

    /// Encode a [`Frame`] for notification to the app.
    pub fn encode_frame(&self, frame: &Frame) -> Vec<u8> {
        self.encode(frame.code, &frame.payload)
    }
}

// ============================================================================
// Stream Framing
// ============================================================================

/// Recovers write boundaries from a byte stream of inbound frames.
///
/// Chunks are cut in front of every `FE FE` magic. Under
/// [`LengthField::Strict`] a frame is also complete once its declared
/// length has arrived. With a marker length byte the last frame in the
/// buffer has no visible end, so it is held until the next magic arrives
/// or the caller [`flush`](FrameSplitter::flush)es it after the stream
/// goes quiet. Bytes that do not start with the magic are passed on as
/// their own chunk so the decoder can reject them.
#[derive(Debug, Default)]
pub struct FrameSplitter {
    length_field: LengthField,
    buffer: BytesMut,
}

impl FrameSplitter {
    /// Create a splitter for the given length policy.
    pub fn new(length_field: LengthField) -> Self {
        FrameSplitter {
            length_field,
            buffer: BytesMut::with_capacity(HEADER_LEN + MAX_PAYLOAD_LEN),
        }
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Take the next complete chunk, if one is known to have ended.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        if self.buffer.is_empty() {
            return None;
        }

        let framed = self.buffer.starts_with(&INBOUND_MAGIC);
        if framed && self.length_field == LengthField::Strict && self.buffer.len() > 2 {
            let total = 3 + usize::from(self.buffer[2]);
            if self.buffer.len() >= total {
                return Some(self.buffer.split_to(total).to_vec());
            }
        }

        // Where the next frame starts, skipping our own magic.
        let from = if framed { INBOUND_MAGIC.len() } else { 1 };
        let end = self.buffer[from..]
            .windows(INBOUND_MAGIC.len())
            .position(|w| w == &INBOUND_MAGIC[..])
            .map(|pos| from + pos)?;
        Some(self.buffer.split_to(end).to_vec())
    }

    /// Take whatever is still buffered as one chunk.
    pub fn flush(&mut self) -> Option<Vec<u8>> {
        if self.buffer.is_empty() {
            return None;
        }
        Some(self.buffer.split().to_vec())
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
