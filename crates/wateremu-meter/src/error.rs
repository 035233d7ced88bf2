//! Error types for meter configuration.

use thiserror::Error;

/// Errors raised while turning a [`crate::MeterConfig`] into a session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `auth_reply` is not valid hex.
    #[error("auth_reply is not valid hex: {0}")]
    AuthReplyHex(String),

    /// `auth_reply` has the wrong size.
    #[error("auth_reply must be {expected} bytes, got {actual}")]
    AuthReplyLength {
        /// Required size.
        expected: usize,
        /// Decoded size.
        actual: usize,
    },

    /// A volume does not fit in its 3-byte field.
    #[error("{field} 0x{value:X} does not fit in 24 bits")]
    VolumeOutOfRange {
        /// Offending configuration key.
        field: &'static str,
        /// Configured value.
        value: u32,
    },
}
