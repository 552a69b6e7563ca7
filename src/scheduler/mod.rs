//! Schedulers.
//!
//! A [`Scheduler`] decides which ready flow on a lower-layer port is served
//! next. Flows register themselves when a PDU lands in their below-queue;
//! each registered flow appears in the scheduler at most once.
//!
//! Policies ([`SchedulerType`]):
//!
//! - `fifo`: flows are served in the order they became ready
//! - `priority`: lowest priority value first, FIFO among equals
//! - `implicitack`: inbound flows (acks) first; an ack is batched together
//!   with the next pending PDU so it rides along in the same frame

mod queue;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::core::{GdtpError, Result};
use crate::flow::{Flow, FlowDirection, FlowKey};
use crate::pdu::Pdu;
use queue::{Rank, ReadyQueue};

/// Scheduling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SchedulerType {
    /// First come, first served.
    #[default]
    Fifo,
    /// Lowest priority value first.
    Priority,
    /// Inbound first, acks piggybacked onto the next PDU.
    ImplicitAck,
}

impl SchedulerType {
    /// Name accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        match self {
            SchedulerType::Fifo => "fifo",
            SchedulerType::Priority => "priority",
            SchedulerType::ImplicitAck => "implicitack",
        }
    }

    fn rank(self, flow: &Flow) -> Rank {
        match self {
            SchedulerType::Fifo => Rank::default(),
            SchedulerType::Priority => Rank {
                class: 0,
                priority: flow.priority(),
            },
            SchedulerType::ImplicitAck => Rank {
                class: match flow.direction() {
                    FlowDirection::Inbound => 0,
                    FlowDirection::Outbound => 1,
                },
                priority: flow.priority(),
            },
        }
    }
}

impl FromStr for SchedulerType {
    type Err = GdtpError;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "fifo" => Ok(SchedulerType::Fifo),
            "priority" => Ok(SchedulerType::Priority),
            "implicitack" => Ok(SchedulerType::ImplicitAck),
            other => Err(GdtpError::Configuration(format!(
                "unknown scheduler type: {other}"
            ))),
        }
    }
}

impl fmt::Display for SchedulerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
struct SchedulerState {
    pending: HashSet<FlowKey>,
    queue: ReadyQueue<Arc<Flow>>,
    active: Option<Arc<Flow>>,
    combined_frames: u64,
}

/// Selects the next flow to serve on one lower-layer port.
#[derive(Debug)]
pub struct Scheduler {
    kind: SchedulerType,
    state: Mutex<SchedulerState>,
    not_empty: Notify,
}

impl Scheduler {
    /// Create an empty scheduler.
    pub fn new(kind: SchedulerType) -> Self {
        Self {
            kind,
            state: Mutex::new(SchedulerState::default()),
            not_empty: Notify::new(),
        }
    }

    /// Policy of this scheduler.
    pub fn kind(&self) -> SchedulerType {
        self.kind
    }

    /// Register a flow with a PDU ready.
    ///
    /// No-op if the flow is already pending, or if its below-queue was
    /// drained before the registration landed.
    pub fn add_flow(&self, flow: Arc<Flow>) {
        {
            let mut state = self.state.lock();
            if !self.enqueue(&mut state, flow) {
                return;
            }
        }
        self.not_empty.notify_one();
    }

    /// Whether any flow is waiting to be served.
    pub fn has_waiting_flow(&self) -> bool {
        !self.state.lock().queue.is_empty()
    }

    /// Number of acks that were batched with another PDU.
    pub fn combined_frames(&self) -> u64 {
        self.state.lock().combined_frames
    }

    /// Serve the next flow, waiting until one is ready.
    ///
    /// Returns one PDU, or two when an ack was combined with the next
    /// pending PDU (`implicitack` only).
    pub async fn get_pdus_for_below(&self) -> Result<Vec<Pdu>> {
        let (flow, pdu) = self.next_frame().await;

        let piggyback = self.kind == SchedulerType::ImplicitAck && pdu.is_ack();
        let mut pdus = vec![pdu];

        if piggyback && self.has_waiting_flow() {
            flow.frame_transmitted()?;
            if let Some((next, pdu)) = self.try_next_frame() {
                debug!(
                    ack_flow = flow.src_id(),
                    data_flow = next.src_id(),
                    "ack combined with next PDU"
                );
                pdus.push(pdu);
                self.state.lock().combined_frames += 1;
            }
        }

        Ok(pdus)
    }

    /// Tell the most recently served flow that its PDUs went out.
    pub fn set_pdus_transmitted(&self) -> Result<()> {
        let active = self.state.lock().active.clone();
        match active {
            Some(flow) => flow.frame_transmitted(),
            None => Err(GdtpError::protocol("no active flow to mark as transmitted")),
        }
    }

    async fn next_frame(&self) -> (Arc<Flow>, Pdu) {
        loop {
            let notified = self.not_empty.notified();
            if let Some(next) = self.try_next_frame() {
                return next;
            }
            notified.await;
        }
    }

    /// Pop pending flows until one yields a PDU; that flow becomes active.
    fn try_next_frame(&self) -> Option<(Arc<Flow>, Pdu)> {
        let mut state = self.state.lock();
        while let Some(flow) = state.queue.pop() {
            state.pending.remove(&flow.key());
            let Some(pdu) = flow.try_frame_for_below() else {
                trace!(flow_id = flow.src_id(), "skipping drained flow");
                continue;
            };
            state.active = Some(flow.clone());
            // A flow may hold several PDUs (acks, broadcasts) but is
            // registered once; put it back while it still has work.
            self.enqueue(&mut state, flow.clone());
            return Some((flow, pdu));
        }
        None
    }

    fn enqueue(&self, state: &mut SchedulerState, flow: Arc<Flow>) -> bool {
        if !flow.has_frame_for_below() || !state.pending.insert(flow.key()) {
            return false;
        }
        trace!(flow_id = flow.src_id(), scheduler = %self.kind, "flow ready");
        let rank = self.kind.rank(&flow);
        state.queue.push(flow, rank);
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Weak;
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;
    use crate::core::{FlowId, FlowProperties, SeqNo};
    use crate::flow::FlowParams;

    fn inbound_flow(src_id: FlowId) -> Arc<Flow> {
        Flow::inbound(
            Weak::new(),
            FlowParams {
                src_id,
                dest_id: 1,
                src_addr: 2,
                dest_addr: 1,
                props: FlowProperties::default(),
                above_port: 1,
                below_port: 0,
                capacity: 10,
            },
        )
    }

    fn ack(src_id: FlowId, seq: SeqNo) -> Pdu {
        Pdu::data(2, 1, src_id, 1, seq, Bytes::new()).ack_for(seq)
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("fifo".parse::<SchedulerType>().unwrap(), SchedulerType::Fifo);
        assert_eq!(
            "priority".parse::<SchedulerType>().unwrap(),
            SchedulerType::Priority
        );
        assert_eq!(
            "implicitack".parse::<SchedulerType>().unwrap(),
            SchedulerType::ImplicitAck
        );
        assert!("roundrobin"
            .parse::<SchedulerType>()
            .unwrap_err()
            .is_configuration());
    }

    #[test]
    fn test_display_roundtrip() {
        for kind in [
            SchedulerType::Fifo,
            SchedulerType::Priority,
            SchedulerType::ImplicitAck,
        ] {
            assert_eq!(kind.to_string().parse::<SchedulerType>().unwrap(), kind);
        }
    }

    #[test]
    fn test_no_active_flow() {
        let scheduler = Scheduler::new(SchedulerType::Fifo);
        assert!(!scheduler.has_waiting_flow());
        assert!(scheduler
            .set_pdus_transmitted()
            .unwrap_err()
            .is_protocol_violation());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_registration_of_drained_flow() {
        let scheduler = Scheduler::new(SchedulerType::Fifo);
        let a = inbound_flow(1);
        let b = inbound_flow(2);

        a.below_queue().push(ack(1, 1)).await;
        scheduler.add_flow(a.clone());
        // Second ack queued; its registration has not landed yet.
        a.below_queue().push(ack(1, 2)).await;

        // Served back to back: the flow is re-queued while it has work.
        let first = scheduler.get_pdus_for_below().await.unwrap();
        let second = scheduler.get_pdus_for_below().await.unwrap();
        assert_eq!(first[0].seq_no, 1);
        assert_eq!(second[0].seq_no, 2);

        scheduler.add_flow(a.clone());
        assert!(!scheduler.has_waiting_flow());

        b.below_queue().push(ack(2, 7)).await;
        scheduler.add_flow(b.clone());

        let pdus = tokio::time::timeout(Duration::from_secs(1), scheduler.get_pdus_for_below())
            .await
            .expect("ready flow served")
            .unwrap();
        assert_eq!(pdus.len(), 1);
        assert_eq!(pdus[0].dest_id, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skips_flow_drained_while_pending() {
        let scheduler = Scheduler::new(SchedulerType::Fifo);
        let a = inbound_flow(1);
        let b = inbound_flow(2);

        a.below_queue().push(ack(1, 1)).await;
        scheduler.add_flow(a.clone());
        b.below_queue().push(ack(2, 1)).await;
        scheduler.add_flow(b.clone());

        assert!(a.below_queue().try_pop().is_some());

        let pdus = tokio::time::timeout(Duration::from_secs(1), scheduler.get_pdus_for_below())
            .await
            .expect("ready flow served")
            .unwrap();
        assert_eq!(pdus[0].dest_id, 2);
        assert!(!scheduler.has_waiting_flow());
    }

    #[tokio::test(start_paused = true)]
    async fn test_piggyback_combines_at_most_two() {
        let scheduler = Scheduler::new(SchedulerType::ImplicitAck);
        let acks = inbound_flow(1);
        let more_acks = inbound_flow(2);

        acks.below_queue().push(ack(1, 1)).await;
        scheduler.add_flow(acks.clone());
        more_acks.below_queue().push(ack(2, 1)).await;
        scheduler.add_flow(more_acks.clone());

        let pdus = scheduler.get_pdus_for_below().await.unwrap();
        assert_eq!(pdus.len(), 2);
        assert_eq!(pdus[0].dest_id, 1);
        assert_eq!(pdus[1].dest_id, 2);
        assert_eq!(scheduler.combined_frames(), 1);
        assert!(!scheduler.has_waiting_flow());
        scheduler.set_pdus_transmitted().unwrap();
    }
}
