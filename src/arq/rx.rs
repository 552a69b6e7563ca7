//! Stop-and-wait receiver.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use super::ArqCounters;
use crate::core::{FlowProperties, GdtpError, Result, SeqNo};
use crate::pdu::{Pdu, PduType};

/// How the receiver classified an incoming data PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameVerdict {
    /// The expected PDU (or the first one seen).
    InOrder,
    /// Newer than expected; `lost` PDUs were skipped over.
    Gap {
        /// Number of PDUs counted as lost.
        lost: u64,
    },
    /// Same sequence number as the previous PDU.
    Duplicate,
    /// Older than expected (beyond half the sequence space).
    Stale,
}

impl FrameVerdict {
    /// Whether the PDU is delivered to the upper layer.
    pub fn is_accepted(self) -> bool {
        matches!(self, FrameVerdict::InOrder | FrameVerdict::Gap { .. })
    }
}

/// Result of handing a data PDU to the receiver.
#[derive(Debug, Clone)]
pub struct RxOutcome {
    /// Classification of the PDU.
    pub verdict: FrameVerdict,
    /// Acknowledgment to send back (reliable flows only).
    pub ack: Option<Pdu>,
    /// PDU to deliver upwards.
    pub deliver: Option<Pdu>,
}

#[derive(Debug, Default)]
struct RxState {
    last_seq: SeqNo,
    expected_seq: SeqNo,
}

/// Receiving half of stop-and-wait ARQ.
#[derive(Debug)]
pub struct StopWaitRx {
    props: Arc<RwLock<FlowProperties>>,
    state: Mutex<RxState>,
    counters: Mutex<ArqCounters>,
}

impl StopWaitRx {
    /// Create a receiver reading its properties from `props`.
    pub fn new(props: Arc<RwLock<FlowProperties>>) -> Self {
        Self {
            props,
            state: Mutex::new(RxState::default()),
            counters: Mutex::new(ArqCounters::default()),
        }
    }

    /// Sequence number of the next PDU expected in order.
    pub fn expected_seq(&self) -> SeqNo {
        self.state.lock().expected_seq
    }

    /// Classify a data PDU, update the counters and build the ack.
    pub fn handle_pdu_from_below(&self, pdu: Pdu) -> Result<RxOutcome> {
        if pdu.pdu_type != PduType::Data {
            return Err(GdtpError::protocol(format!(
                "receiver got {:?} PDU, expected data",
                pdu.pdu_type
            )));
        }

        let (max_seqno, reliable) = {
            let props = self.props.read();
            (props.max_seqno, props.is_reliable())
        };

        let seq = pdu.seq_no;
        let mut state = self.state.lock();
        let mut counters = self.counters.lock();
        let stats = counters.total_mut();
        stats.pdus_from_below += 1;

        let mut ack_no = seq;
        let verdict = if seq == state.last_seq {
            FrameVerdict::Duplicate
        } else if seq < state.expected_seq && seq > max_seqno / 2 {
            ack_no = state.expected_seq.saturating_sub(1);
            FrameVerdict::Stale
        } else if seq > state.expected_seq && state.expected_seq != 0 {
            let lost = seq - state.expected_seq;
            stats.lost_pdus += lost;
            FrameVerdict::Gap { lost }
        } else {
            FrameVerdict::InOrder
        };

        match verdict {
            FrameVerdict::Duplicate => debug!(seq_no = seq, "duplicate PDU"),
            FrameVerdict::Stale => debug!(
                seq_no = seq,
                expected = state.expected_seq,
                "stale PDU"
            ),
            FrameVerdict::Gap { lost } => debug!(
                seq_no = seq,
                expected = state.expected_seq,
                lost,
                "sequence gap"
            ),
            FrameVerdict::InOrder => trace!(seq_no = seq, "in-order PDU"),
        }

        let ack = reliable.then(|| {
            stats.pdus_for_below += 1;
            pdu.ack_for(ack_no)
        });

        let deliver = if verdict.is_accepted() {
            state.expected_seq = (ack_no + 1) % max_seqno;
            stats.sdus_for_above += 1;
            stats.bytes_for_above += pdu.payload.len() as u64;
            Some(pdu)
        } else {
            None
        };

        state.last_seq = seq;

        Ok(RxOutcome {
            verdict,
            ack,
            deliver,
        })
    }

    pub(super) fn counters(&self) -> &Mutex<ArqCounters> {
        &self.counters
    }
}
