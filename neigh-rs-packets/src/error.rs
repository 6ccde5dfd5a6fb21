use std::error::Error;
use std::fmt;

/// Reasons an inbound frame fails to decode. Every variant is a drop:
/// callers count it and move on, a bad frame never propagates further.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Buffer is shorter than the fixed header it should contain.
    ShortFrame,
    /// Structurally broken frame; the message says which check failed.
    Malformed(&'static str),
    /// ICMPv6 pseudo-header checksum did not fold to zero.
    InvalidChecksum,
    /// Well-formed but a message type this codec does not handle.
    UnsupportedType(u16),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodeError::ShortFrame => write!(f, "short frame"),
            DecodeError::Malformed(what) => write!(f, "malformed frame: {}", what),
            DecodeError::InvalidChecksum => write!(f, "invalid checksum"),
            DecodeError::UnsupportedType(kind) => write!(f, "unsupported message type {}", kind),
        }
    }
}

impl Error for DecodeError {}

/// Raised when a raw address buffer handed to an encoder has the wrong
/// length for the protocol field it is destined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    BadAddressLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EncodeError::BadAddressLength {
                field,
                expected,
                actual,
            } => write!(
                f,
                "{} must be {} bytes, got {}",
                field, expected, actual
            ),
        }
    }
}

impl Error for EncodeError {}
