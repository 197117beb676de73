//! # Error Types
//!
//! Defines error types used across subsystems.

use thiserror::Error;

/// Errors raised while decoding hex-encoded values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// Value is not valid hexadecimal.
    #[error("Invalid hex value: {0}")]
    InvalidHex(String),

    /// Value does not fit the target width.
    #[error("Value out of range: {value} exceeds {bits} bits")]
    OutOfRange { value: String, bits: u32 },
}

/// Errors raised when parsing user-facing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Unknown event kind name.
    #[error("Unknown event kind: {0}")]
    UnknownEventKind(String),

    /// Unknown lookup field name.
    #[error("Unknown event field: {0}")]
    UnknownField(String),
}
