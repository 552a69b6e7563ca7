//! Outbound flow behaviour.

use std::sync::Arc;

use bytes::Bytes;
use tracing::trace;

use super::Flow;
use crate::arq::ArqEngine;
use crate::core::{is_broadcast_addr, AddressingMode, GdtpError, Result};
use crate::net::ipv4_addresses;
use crate::pdu::Pdu;

impl Flow {
    pub(super) async fn outbound_from_above(self: &Arc<Self>, sdu: Bytes) -> Result<()> {
        let ArqEngine::Transmitter(tx) = &self.engine else {
            return Err(GdtpError::protocol("outbound flow without transmitter"));
        };

        let mut counter = self.seq_counter.lock().await;
        let props = self.properties();

        let addrs = if props.addressing_mode == AddressingMode::Implicit {
            let (src, dest) = ipv4_addresses(&sdu).ok_or_else(|| {
                GdtpError::protocol("implicit addressing requires an IPv4 SDU")
            })?;
            let mut addrs = self.addrs.lock();
            addrs.src = src;
            addrs.dest = dest;
            *addrs
        } else {
            *self.addrs.lock()
        };

        *counter = counter.wrapping_add(1);
        let seq_no = *counter % props.max_seqno;
        let pdu = Pdu::data(addrs.src, addrs.dest, self.src_id, self.dest_id, seq_no, sdu);
        trace!(flow_id = self.src_id, seq_no, len = pdu.payload.len(), "SDU from above");

        if is_broadcast_addr(addrs.dest) {
            // Broadcast PDUs bypass the ARQ.
            self.record(|stats| {
                stats.sdus_from_above += 1;
                stats.bytes_from_above += pdu.payload.len() as u64;
                stats.pdus_for_below += 1;
            });
            self.queue_pdu_for_below(pdu).await
        } else {
            tx.handle_pdu_from_above(pdu).await;
            Ok(())
        }
    }

    pub(super) fn outbound_from_below(&self, pdu: Pdu) -> Result<()> {
        if self.is_broadcast() {
            return Err(GdtpError::protocol(format!(
                "PDU from below on broadcast flow {}",
                self.src_id
            )));
        }
        match &self.engine {
            ArqEngine::Transmitter(tx) => tx.handle_pdu_from_below(&pdu),
            ArqEngine::Receiver(_) => Err(GdtpError::protocol("outbound flow without transmitter")),
        }
    }
}
