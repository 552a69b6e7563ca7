//! Stop-and-wait transmitter.

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, trace, warn};

use super::{ArqCounters, ArqState};
use crate::buffer::BoundedQueue;
use crate::core::{FlowProperties, GdtpError, Result, SeqNo};
use crate::flow::Flow;
use crate::pdu::Pdu;

#[derive(Debug, Default)]
struct TxState {
    state: ArqState,
    tx_seq: SeqNo,
    num_tx: u32,
}

#[derive(Debug)]
struct TxShared {
    pending: BoundedQueue<Pdu>,
    state: Mutex<TxState>,
    counters: Mutex<ArqCounters>,
    tx_over: Notify,
    acked: Notify,
}

impl TxShared {
    fn state(&self) -> ArqState {
        self.state.lock().state
    }
}

/// Sending half of stop-and-wait ARQ.
///
/// PDUs from above are queued and handed to a worker task that sends them
/// one at a time. Dropping the transmitter aborts the worker.
#[derive(Debug)]
pub struct StopWaitTx {
    shared: Arc<TxShared>,
    worker: JoinHandle<()>,
}

impl StopWaitTx {
    /// Spawn the worker. Must be called from within a tokio runtime.
    ///
    /// Transmissions are pushed to `below`; `flow` is told when a PDU is
    /// ready so it can register with its scheduler.
    pub(crate) fn spawn(
        flow: Weak<Flow>,
        below: Arc<BoundedQueue<Pdu>>,
        props: Arc<RwLock<FlowProperties>>,
        capacity: usize,
    ) -> Self {
        let shared = Arc::new(TxShared {
            pending: BoundedQueue::new(capacity),
            state: Mutex::new(TxState::default()),
            counters: Mutex::new(ArqCounters::default()),
            tx_over: Notify::new(),
            acked: Notify::new(),
        });

        let worker = TxWorker {
            shared: shared.clone(),
            flow,
            below,
            props,
        };
        let worker = tokio::spawn(worker.run());

        Self { shared, worker }
    }

    /// Current state of the PDU in flight.
    pub fn state(&self) -> ArqState {
        self.shared.state()
    }

    /// Sequence number of the PDU in flight.
    pub fn tx_seq(&self) -> SeqNo {
        self.shared.state.lock().tx_seq
    }

    /// Queue a data PDU, waiting while the transmit queue is full.
    pub async fn handle_pdu_from_above(&self, pdu: Pdu) {
        {
            let mut counters = self.shared.counters.lock();
            let stats = counters.total_mut();
            stats.sdus_from_above += 1;
            stats.bytes_from_above += pdu.payload.len() as u64;
        }
        self.shared.pending.push(pdu).await;
    }

    /// Handle a PDU from the peer. Only acknowledgments are valid here.
    pub fn handle_pdu_from_below(&self, pdu: &Pdu) -> Result<()> {
        if !pdu.is_ack() {
            return Err(GdtpError::protocol(format!(
                "transmitter got {:?} PDU, expected ack",
                pdu.pdu_type
            )));
        }
        self.shared.counters.lock().total_mut().pdus_from_below += 1;

        let mut st = self.shared.state.lock();
        let current = st.state;
        match current {
            // TxOver is accepted as well as WaitingForAck: the ack can
            // arrive before the worker re-arms.
            ArqState::TxOver | ArqState::WaitingForAck => {
                if pdu.seq_no == st.tx_seq {
                    st.state = ArqState::Finished;
                    drop(st);
                    debug!(seq_no = pdu.seq_no, "ack received");
                    self.shared.acked.notify_one();
                } else if pdu.seq_no < st.tx_seq {
                    debug!(seq_no = pdu.seq_no, tx_seq = st.tx_seq, "old ack ignored");
                } else {
                    warn!(seq_no = pdu.seq_no, tx_seq = st.tx_seq, "unexpected ack");
                }
            }
            state => trace!(seq_no = pdu.seq_no, ?state, "ack ignored"),
        }
        Ok(())
    }

    /// The lower layer finished sending the PDU in flight.
    pub fn frame_transmitted(&self) -> Result<()> {
        let mut st = self.shared.state.lock();
        if st.state != ArqState::WaitingForTx {
            return Err(GdtpError::protocol(format!(
                "frame transmitted in state {:?}",
                st.state
            )));
        }
        st.state = ArqState::TxOver;
        drop(st);
        self.shared.tx_over.notify_one();
        Ok(())
    }

    pub(super) fn counters(&self) -> &Mutex<ArqCounters> {
        &self.shared.counters
    }
}

impl Drop for StopWaitTx {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

struct TxWorker {
    shared: Arc<TxShared>,
    flow: Weak<Flow>,
    below: Arc<BoundedQueue<Pdu>>,
    props: Arc<RwLock<FlowProperties>>,
}

impl TxWorker {
    async fn run(self) {
        loop {
            let pdu = self.shared.pending.pop().await;
            self.transmit(pdu).await;
        }
    }

    async fn transmit(&self, pdu: Pdu) {
        {
            let mut st = self.shared.state.lock();
            st.tx_seq = pdu.seq_no;
            st.num_tx = 0;
            st.state = ArqState::Idle;
        }

        loop {
            let num_tx = {
                let mut st = self.shared.state.lock();
                st.state = ArqState::WaitingForTx;
                st.num_tx += 1;
                st.num_tx
            };
            self.shared.counters.lock().total_mut().pdus_for_below += 1;
            trace!(seq_no = pdu.seq_no, num_tx, "queueing PDU below");

            self.queue_below(pdu.clone()).await;
            self.wait_for_tx_over().await;

            let props = self.props.read().clone();
            if !props.is_reliable() {
                self.shared.state.lock().state = ArqState::Finished;
                return;
            }

            {
                let mut st = self.shared.state.lock();
                if st.state == ArqState::TxOver {
                    st.state = ArqState::WaitingForAck;
                }
            }

            let deadline = Instant::now() + props.ack_timeout;
            if self.wait_for_ack(deadline).await {
                return;
            }

            let exhausted = num_tx >= props.max_retransmissions;
            {
                let mut st = self.shared.state.lock();
                if st.state == ArqState::Finished {
                    // Acked between the timeout and here.
                    return;
                }
                st.state = if exhausted {
                    ArqState::Finished
                } else {
                    ArqState::Timeout
                };
            }

            let mut counters = self.shared.counters.lock();
            if exhausted {
                counters.total_mut().lost_pdus += 1;
                warn!(seq_no = pdu.seq_no, num_tx, "PDU lost, retransmissions exhausted");
                return;
            }
            counters.total_mut().retransmitted_pdus += 1;
            debug!(seq_no = pdu.seq_no, num_tx, "ack timeout, retransmitting");
        }
    }

    async fn queue_below(&self, pdu: Pdu) {
        self.below.push(pdu).await;
        if let Some(flow) = self.flow.upgrade() {
            if let Err(err) = flow.mark_ready().await {
                warn!(%err, "failed to schedule flow");
            }
        }
    }

    async fn wait_for_tx_over(&self) {
        loop {
            let notified = self.shared.tx_over.notified();
            if self.shared.state() != ArqState::WaitingForTx {
                return;
            }
            notified.await;
        }
    }

    /// Returns `true` once acknowledged, `false` on timeout.
    async fn wait_for_ack(&self, deadline: Instant) -> bool {
        loop {
            let notified = self.shared.acked.notified();
            if self.shared.state() == ArqState::Finished {
                return true;
            }
            if timeout_at(deadline, notified).await.is_err() {
                return false;
            }
        }
    }
}
