//! Identifier aliases and small enums shared by every layer.

use super::constants::{BROADCAST_ADDRESS, BROADCAST_ADDRESS_SHORT};

/// Flow identifier. Unique per flow manager and direction.
pub type FlowId = u32;

/// Identifier of an upper- or lower-layer port.
pub type PortId = u32;

/// Peer address.
pub type Addr = u64;

/// Sequence number. Bounded in practice by the flow's `max_seqno`.
pub type SeqNo = u64;

/// Degree of reliability of a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransferMode {
    /// Every data PDU is acknowledged and retransmitted until acknowledged
    /// or the retransmission budget is spent.
    #[default]
    Reliable,
    /// Each data PDU is transmitted exactly once.
    Unreliable,
}

impl TransferMode {
    /// Human readable name.
    pub fn as_str(self) -> &'static str {
        match self {
            TransferMode::Reliable => "Reliable",
            TransferMode::Unreliable => "Unreliable",
        }
    }
}

/// How a flow obtains its addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressingMode {
    /// Fixed addresses taken from the manager defaults.
    #[default]
    Explicit,
    /// Source address from a network device, per-SDU addresses from the
    /// IPv4 header of the payload.
    Implicit,
}

/// Returns `true` if `addr` is one of the reserved broadcast addresses.
pub fn is_broadcast_addr(addr: Addr) -> bool {
    addr == BROADCAST_ADDRESS || addr == BROADCAST_ADDRESS_SHORT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_addresses() {
        assert!(is_broadcast_addr(65535));
        assert!(is_broadcast_addr(127));
        assert!(!is_broadcast_addr(1));
        assert!(!is_broadcast_addr(128));
    }

    #[test]
    fn test_defaults() {
        assert_eq!(TransferMode::default(), TransferMode::Reliable);
        assert_eq!(AddressingMode::default(), AddressingMode::Explicit);
        assert_eq!(TransferMode::Unreliable.as_str(), "Unreliable");
    }
}
