//! Protocol constants.
//!
//! Values marked as wire constants are shared with the peer and MUST NOT be
//! changed without bumping [`FRAME_VERSION`].

use std::time::Duration;

use super::types::{Addr, FlowId, PortId, SeqNo};

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Largest flow id handed out by `allocate_flow`.
///
/// Generated ids lie in `1..=MAX_NUM_FLOWS`.
pub const MAX_NUM_FLOWS: FlowId = 255;

/// The only lower-layer port that currently supports scheduler replacement.
pub const DEFAULT_BELOW_PORT_ID: PortId = 0;

// =============================================================================
// ADDRESSING
// =============================================================================

/// Broadcast address for wide address spaces.
pub const BROADCAST_ADDRESS: Addr = 65535;

/// Broadcast address for small-address-space networks.
pub const BROADCAST_ADDRESS_SHORT: Addr = 127;

/// Source address used for outbound flows unless configured otherwise.
pub const DEFAULT_SOURCE_ADDRESS: Addr = 1;

/// Destination address used for outbound flows unless configured otherwise.
pub const DEFAULT_DESTINATION_ADDRESS: Addr = BROADCAST_ADDRESS;

// =============================================================================
// FLOW PROPERTY DEFAULTS
// =============================================================================

/// Default flow priority. Lower values are served first.
pub const DEFAULT_PRIORITY: u32 = 99;

/// Default sequence number modulus.
pub const DEFAULT_MAX_SEQNO: SeqNo = 127;

/// Smallest usable sequence number modulus.
pub const MIN_MAX_SEQNO: SeqNo = 2;

/// Default time to wait for an acknowledgment.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_millis(100);

/// Default number of transmissions before a PDU is declared lost.
pub const DEFAULT_MAX_RETRANSMISSIONS: u32 = 7;

/// Default network device used for implicit addressing.
pub const DEFAULT_ADDR_DEV: &str = "tun0";

// =============================================================================
// BUFFERS
// =============================================================================

/// Capacity of the per-flow and per-port queues.
pub const DEFAULT_BUFFER_SIZE: usize = 10;

// =============================================================================
// WIRE FORMAT (wire constants)
// =============================================================================

/// Version byte leading every encoded frame.
pub const FRAME_VERSION: u8 = 1;

/// Frame header size (version + PDU count).
pub const FRAME_HEADER_SIZE: usize = 1 + 2;

/// Per-PDU record header size
/// (type + src addr + dest addr + src id + dest id + seqno + payload length).
pub const PDU_RECORD_HEADER_SIZE: usize = 1 + 8 + 8 + 4 + 4 + 8 + 4;

/// Type tag: data PDU.
pub const PDU_TYPE_DATA: u8 = 0;

/// Type tag: acknowledgment PDU.
pub const PDU_TYPE_ACK: u8 = 1;

/// Type tag: broadcast PDU.
pub const PDU_TYPE_BROADCAST: u8 = 2;
