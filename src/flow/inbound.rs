//! Inbound flow behaviour.

use std::sync::Arc;

use tracing::trace;

use super::Flow;
use crate::arq::ArqEngine;
use crate::core::{GdtpError, Result};
use crate::pdu::Pdu;

impl Flow {
    pub(super) async fn inbound_from_below(self: &Arc<Self>, pdu: Pdu) -> Result<()> {
        if self.is_broadcast() {
            self.record(|stats| {
                stats.pdus_from_below += 1;
                stats.sdus_for_above += 1;
                stats.bytes_for_above += pdu.payload.len() as u64;
            });
            return self.queue_pdu_for_above(pdu).await;
        }

        let ArqEngine::Receiver(rx) = &self.engine else {
            return Err(GdtpError::protocol("inbound flow without receiver"));
        };
        let outcome = rx.handle_pdu_from_below(pdu)?;
        trace!(flow_id = self.src_id, verdict = ?outcome.verdict, "PDU from below");

        if let Some(ack) = outcome.ack {
            self.queue_pdu_for_below(ack).await?;
        }
        if let Some(pdu) = outcome.deliver {
            self.queue_pdu_for_above(pdu).await?;
        }
        Ok(())
    }
}
