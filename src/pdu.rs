//! Protocol data units.

use bytes::Bytes;

use crate::core::{
    is_broadcast_addr, Addr, FlowId, SeqNo, PDU_TYPE_ACK, PDU_TYPE_BROADCAST, PDU_TYPE_DATA,
};

/// PDU type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PduType {
    /// Carries an SDU.
    Data = PDU_TYPE_DATA,
    /// Acknowledges a data PDU.
    Ack = PDU_TYPE_ACK,
    /// Broadcast data, never acknowledged.
    Broadcast = PDU_TYPE_BROADCAST,
}

impl PduType {
    /// Parse a PDU type from its tag.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            PDU_TYPE_DATA => Some(Self::Data),
            PDU_TYPE_ACK => Some(Self::Ack),
            PDU_TYPE_BROADCAST => Some(Self::Broadcast),
            _ => None,
        }
    }

    /// Tag written on the wire.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A single protocol data unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    /// Flow id chosen by the sender.
    pub src_id: FlowId,
    /// Flow id the sender targets.
    pub dest_id: FlowId,
    /// Sender address.
    pub src_addr: Addr,
    /// Receiver address.
    pub dest_addr: Addr,
    /// Kind of PDU.
    pub pdu_type: PduType,
    /// Sequence number (data) or acknowledged number (ack).
    pub seq_no: SeqNo,
    /// SDU bytes. Empty for acks.
    pub payload: Bytes,
}

impl Pdu {
    /// Build a data PDU.
    pub fn data(
        src_addr: Addr,
        dest_addr: Addr,
        src_id: FlowId,
        dest_id: FlowId,
        seq_no: SeqNo,
        payload: Bytes,
    ) -> Self {
        Self {
            src_id,
            dest_id,
            src_addr,
            dest_addr,
            pdu_type: PduType::Data,
            seq_no,
            payload,
        }
    }

    /// Build the acknowledgment answering `self`.
    ///
    /// Addresses and ids are swapped so the ack routes back to the sender.
    pub fn ack_for(&self, ack_no: SeqNo) -> Self {
        Self {
            src_id: self.dest_id,
            dest_id: self.src_id,
            src_addr: self.dest_addr,
            dest_addr: self.src_addr,
            pdu_type: PduType::Ack,
            seq_no: ack_no,
            payload: Bytes::new(),
        }
    }

    /// Whether this PDU is addressed to a broadcast address.
    pub fn is_broadcast(&self) -> bool {
        is_broadcast_addr(self.dest_addr)
    }

    /// Whether this PDU is an acknowledgment.
    pub fn is_ack(&self) -> bool {
        self.pdu_type == PduType::Ack
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdu_type_tags() {
        for t in [PduType::Data, PduType::Ack, PduType::Broadcast] {
            assert_eq!(PduType::from_byte(t.as_byte()), Some(t));
        }
        assert_eq!(PduType::from_byte(3), None);
    }

    #[test]
    fn test_ack_swaps_addressing() {
        let data = Pdu::data(1, 2, 10, 20, 5, Bytes::from_static(b"payload"));
        let ack = data.ack_for(5);

        assert!(ack.is_ack());
        assert_eq!(ack.src_addr, 2);
        assert_eq!(ack.dest_addr, 1);
        assert_eq!(ack.src_id, 20);
        assert_eq!(ack.dest_id, 10);
        assert_eq!(ack.seq_no, 5);
        assert!(ack.payload.is_empty());
    }

    #[test]
    fn test_broadcast_detection() {
        let pdu = Pdu::data(1, 127, 1, 1, 1, Bytes::new());
        assert!(pdu.is_broadcast());
        let pdu = Pdu::data(1, 2, 1, 1, 1, Bytes::new());
        assert!(!pdu.is_broadcast());
    }
}
