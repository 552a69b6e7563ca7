//! Core traits for GDTP.
//!
//! These traits are the seams where callers plug in their own wire format
//! and network-device lookup.

use bytes::Bytes;

use super::error::{DecodeError, GdtpError};
use super::types::Addr;
use crate::pdu::Pdu;

/// Converts batches of PDUs to and from a single wire frame.
///
/// # Requirements
///
/// - `decode(encode(batch))` MUST return `batch` unchanged
/// - `decode` MUST reject malformed input instead of guessing
///
/// # Example
///
/// ```
/// use gdtp::prelude::*;
///
/// let codec = FrameCodec::new();
/// let pdu = Pdu::data(1, 2, 10, 20, 1, Bytes::from_static(b"hi"));
/// let frame = codec.encode(std::slice::from_ref(&pdu)).unwrap();
/// assert_eq!(codec.decode(&frame).unwrap(), vec![pdu]);
/// ```
pub trait Codec: Send + Sync + 'static {
    /// Serialize a non-empty batch into one frame.
    fn encode(&self, pdus: &[Pdu]) -> Result<Bytes, DecodeError>;

    /// Parse one frame back into its batch.
    fn decode(&self, data: &[u8]) -> Result<Vec<Pdu>, DecodeError>;
}

/// Looks up the address assigned to a network device.
///
/// Used by flows in implicit addressing mode to learn their source address.
pub trait DeviceResolver: Send + Sync + 'static {
    /// Address of `dev`, or a configuration error if it has none.
    fn resolve(&self, dev: &str) -> Result<Addr, GdtpError>;
}
