//! Error types for GDTP.

use thiserror::Error;

use super::types::{FlowId, PortId};

/// Errors that can occur when decoding a frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Not enough bytes for the next header or payload.
    #[error("frame too short: expected {expected} bytes, got {actual}")]
    TooShort {
        /// Bytes required.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// Unsupported frame version.
    #[error("unsupported frame version: {0}")]
    UnsupportedVersion(u8),

    /// Unknown PDU type tag.
    #[error("invalid PDU type: {0}")]
    InvalidType(u8),

    /// A frame must carry at least one PDU.
    #[error("frame carries no PDUs")]
    EmptyFrame,

    /// Bytes left over after the last record.
    #[error("{0} trailing bytes after last PDU")]
    TrailingBytes(usize),

    /// Batch does not fit the 16-bit count field.
    #[error("too many PDUs in one frame")]
    TooManyPdus,

    /// Payload does not fit the 32-bit length field.
    #[error("payload too large")]
    PayloadTooLarge,
}

/// Top-level GDTP errors.
#[derive(Debug, Error)]
pub enum GdtpError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A peer or caller broke the protocol contract.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// An outbound flow towards this id already exists.
    #[error("flow {0} already allocated")]
    DuplicateFlow(FlowId),

    /// No flow with this id.
    #[error("unknown flow: {0}")]
    UnknownFlow(FlowId),

    /// No scheduler registered for this lower-layer port.
    #[error("unknown port: {0}")]
    UnknownPort(PortId),

    /// Every flow id is taken.
    #[error("flow ids exhausted")]
    FlowIdsExhausted,

    /// Decode error.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The manager or a worker has shut down.
    #[error("closed")]
    Closed,
}

impl GdtpError {
    /// Returns `true` for [`GdtpError::Configuration`].
    pub fn is_configuration(&self) -> bool {
        matches!(self, GdtpError::Configuration(_))
    }

    /// Returns `true` for [`GdtpError::ProtocolViolation`].
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, GdtpError::ProtocolViolation(_))
    }

    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        GdtpError::ProtocolViolation(msg.into())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GdtpError>;
