//! Flows.
//!
//! A [`Flow`] is one direction of a conversation between two peers. Outbound
//! flows are allocated by the local application and own a stop-and-wait
//! transmitter; inbound flows are created on the first data PDU from a peer
//! and own a receiver. Both keep a queue of PDUs waiting for the lower layer
//! and a non-owning handle back to their manager.

mod inbound;
mod outbound;

use std::fmt;
use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};

use crate::arq::{ArqEngine, StopWaitRx, StopWaitTx};
use crate::buffer::BoundedQueue;
use crate::core::{
    is_broadcast_addr, Addr, ArqStats, FlowId, FlowProperties, GdtpError, PortId, Result,
    SeqNo, StatsMode,
};
use crate::manager::ManagerShared;
use crate::pdu::Pdu;

/// Direction of a flow relative to the local node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowDirection {
    /// Created on the first PDU from a peer.
    Inbound,
    /// Allocated by the local application.
    Outbound,
}

impl fmt::Display for FlowDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowDirection::Inbound => f.write_str("In"),
            FlowDirection::Outbound => f.write_str("Out"),
        }
    }
}

/// Identity of a flow within one manager.
///
/// Inbound flows are keyed by the peer as well, so a remote id can never
/// collide with a local outbound id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowKey {
    /// Local source id.
    Outbound(FlowId),
    /// Peer address and the peer's source id.
    Inbound {
        /// Peer address.
        peer: Addr,
        /// Source id chosen by the peer.
        src_id: FlowId,
    },
}

/// Snapshot of a flow for status reports.
#[derive(Debug, Clone)]
pub struct FlowSummary {
    /// Source id.
    pub id: FlowId,
    /// Direction.
    pub direction: FlowDirection,
    /// Source address.
    pub src_addr: Addr,
    /// Destination address.
    pub dest_addr: Addr,
    /// Lifetime counters.
    pub stats: ArqStats,
}

#[derive(Debug, Clone, Copy)]
struct FlowAddrs {
    src: Addr,
    dest: Addr,
}

/// Construction parameters shared by both directions.
#[derive(Debug, Clone)]
pub(crate) struct FlowParams {
    pub src_id: FlowId,
    pub dest_id: FlowId,
    pub src_addr: Addr,
    pub dest_addr: Addr,
    pub props: FlowProperties,
    pub above_port: PortId,
    pub below_port: PortId,
    pub capacity: usize,
}

/// One direction of a conversation.
#[derive(Debug)]
pub struct Flow {
    key: FlowKey,
    direction: FlowDirection,
    src_id: FlowId,
    dest_id: FlowId,
    addrs: Mutex<FlowAddrs>,
    props: Arc<RwLock<FlowProperties>>,
    above_port: PortId,
    below_port: PortId,
    below: Arc<BoundedQueue<Pdu>>,
    engine: ArqEngine,
    /// Outbound sequence counter. Held while a PDU is handed to the
    /// transmitter so PDUs queue in sequence order.
    seq_counter: tokio::sync::Mutex<SeqNo>,
    manager: Weak<ManagerShared>,
}

impl Flow {
    /// Create an outbound flow and spawn its transmitter.
    pub(crate) fn outbound(manager: Weak<ManagerShared>, params: FlowParams) -> Arc<Flow> {
        let props = Arc::new(RwLock::new(params.props));
        let below = Arc::new(BoundedQueue::new(params.capacity));

        Arc::new_cyclic(|weak| {
            let tx = StopWaitTx::spawn(weak.clone(), below.clone(), props.clone(), params.capacity);
            Flow {
                key: FlowKey::Outbound(params.src_id),
                direction: FlowDirection::Outbound,
                src_id: params.src_id,
                dest_id: params.dest_id,
                addrs: Mutex::new(FlowAddrs {
                    src: params.src_addr,
                    dest: params.dest_addr,
                }),
                props,
                above_port: params.above_port,
                below_port: params.below_port,
                below,
                engine: ArqEngine::Transmitter(tx),
                seq_counter: tokio::sync::Mutex::new(0),
                manager,
            }
        })
    }

    /// Create an inbound flow for a peer.
    pub(crate) fn inbound(manager: Weak<ManagerShared>, params: FlowParams) -> Arc<Flow> {
        let props = Arc::new(RwLock::new(params.props));
        Arc::new(Flow {
            key: FlowKey::Inbound {
                peer: params.src_addr,
                src_id: params.src_id,
            },
            direction: FlowDirection::Inbound,
            src_id: params.src_id,
            dest_id: params.dest_id,
            addrs: Mutex::new(FlowAddrs {
                src: params.src_addr,
                dest: params.dest_addr,
            }),
            engine: ArqEngine::Receiver(StopWaitRx::new(props.clone())),
            props,
            above_port: params.above_port,
            below_port: params.below_port,
            below: Arc::new(BoundedQueue::new(params.capacity)),
            seq_counter: tokio::sync::Mutex::new(0),
            manager,
        })
    }

    /// Key of this flow within its manager.
    pub fn key(&self) -> FlowKey {
        self.key
    }

    /// Direction of this flow.
    pub fn direction(&self) -> FlowDirection {
        self.direction
    }

    /// Id chosen by the sending side.
    pub fn src_id(&self) -> FlowId {
        self.src_id
    }

    /// Id the sending side targets.
    pub fn dest_id(&self) -> FlowId {
        self.dest_id
    }

    /// Current source address.
    pub fn src_addr(&self) -> Addr {
        self.addrs.lock().src
    }

    /// Current destination address.
    pub fn dest_addr(&self) -> Addr {
        self.addrs.lock().dest
    }

    /// Upper-layer port SDUs are delivered to.
    pub fn above_port(&self) -> PortId {
        self.above_port
    }

    /// Lower-layer port this flow is scheduled on.
    pub fn below_port(&self) -> PortId {
        self.below_port
    }

    /// Scheduling priority. Lower values are served first.
    pub fn priority(&self) -> u32 {
        self.props.read().priority
    }

    /// Copy of the current properties.
    pub fn properties(&self) -> FlowProperties {
        self.props.read().clone()
    }

    /// Replace the properties as a whole.
    pub fn set_properties(&self, props: FlowProperties) -> Result<()> {
        props.validate()?;
        *self.props.write() = props;
        Ok(())
    }

    /// Whether the flow targets a broadcast address.
    pub fn is_broadcast(&self) -> bool {
        is_broadcast_addr(self.dest_addr())
    }

    /// Whether PDUs are waiting for the lower layer.
    pub fn has_frame_for_below(&self) -> bool {
        !self.below.is_empty()
    }

    /// Number of PDUs waiting for the lower layer.
    pub fn below_len(&self) -> usize {
        self.below.len()
    }

    /// Take the next PDU for the lower layer, if any.
    pub fn try_frame_for_below(&self) -> Option<Pdu> {
        self.below.try_pop()
    }

    #[cfg(test)]
    pub(crate) fn below_queue(&self) -> &BoundedQueue<Pdu> {
        &self.below
    }

    /// ARQ statistics over the requested window.
    pub fn stats(&self, mode: StatsMode) -> ArqStats {
        self.engine.stats(mode)
    }

    /// The ARQ engine of this flow.
    pub fn engine(&self) -> &ArqEngine {
        &self.engine
    }

    /// Lifetime snapshot for status reports.
    pub fn summary(&self) -> FlowSummary {
        let addrs = *self.addrs.lock();
        FlowSummary {
            id: self.src_id,
            direction: self.direction,
            src_addr: addrs.src,
            dest_addr: addrs.dest,
            stats: self.stats(StatsMode::Total),
        }
    }

    /// Hand an SDU from the upper layer to this (outbound) flow.
    pub async fn handle_frame_from_above(self: &Arc<Self>, sdu: Bytes) -> Result<()> {
        match self.direction {
            FlowDirection::Outbound => self.outbound_from_above(sdu).await,
            FlowDirection::Inbound => Err(GdtpError::protocol(format!(
                "SDU from above on inbound flow {}",
                self.src_id
            ))),
        }
    }

    /// Hand a PDU from the peer to this flow.
    pub async fn handle_frame_from_below(self: &Arc<Self>, pdu: Pdu) -> Result<()> {
        match self.direction {
            FlowDirection::Outbound => self.outbound_from_below(pdu),
            FlowDirection::Inbound => self.inbound_from_below(pdu).await,
        }
    }

    /// The lower layer finished sending this flow's last PDU.
    pub fn frame_transmitted(&self) -> Result<()> {
        match (&self.engine, self.direction) {
            (ArqEngine::Transmitter(tx), FlowDirection::Outbound) if !self.is_broadcast() => {
                tx.frame_transmitted()
            }
            _ => Ok(()),
        }
    }

    /// Register with the scheduler of the below port.
    pub(crate) async fn mark_ready(self: &Arc<Self>) -> Result<()> {
        let manager = self.manager.upgrade().ok_or(GdtpError::Closed)?;
        manager.mark_flow_as_ready(self.clone()).await
    }

    async fn queue_pdu_for_below(self: &Arc<Self>, pdu: Pdu) -> Result<()> {
        self.below.push(pdu).await;
        self.mark_ready().await
    }

    async fn queue_pdu_for_above(&self, pdu: Pdu) -> Result<()> {
        let manager = self.manager.upgrade().ok_or(GdtpError::Closed)?;
        manager.add_frame_for_above(pdu, self.above_port).await
    }

    fn record(&self, update: impl FnOnce(&mut ArqStats)) {
        update(self.engine.counters().lock().total_mut());
    }
}
