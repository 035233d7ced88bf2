//! Protocol error types.

use thiserror::Error;

/// Errors that can occur when decoding an inbound frame.
///
/// None of these are fatal: the frame is dropped and the session is left
/// as it was.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Frame is too short to hold a header.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Expected minimum length.
        expected: usize,
        /// Actual length received.
        actual: usize,
    },

    /// Frame does not start with the expected magic.
    #[error("bad magic: expected {expected:02X?}, got {actual:02X?}")]
    BadMagic {
        /// Magic required for this direction.
        expected: [u8; 2],
        /// Magic found in the frame.
        actual: [u8; 2],
    },

    /// Length byte disagrees with the active length policy.
    #[error("length mismatch: frame declares 0x{declared:02X}, expected 0x{expected:02X}")]
    LengthMismatch {
        /// Byte found in the length position.
        declared: u8,
        /// Value the policy required.
        expected: usize,
    },
}

/// A tariff value that cannot be represented.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("invalid tariff {0}: must be finite, non-negative and at most 4294967.295")]
pub struct InvalidTariff(pub f64);
