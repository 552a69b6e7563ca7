//! Flow manager.
//!
//! The [`FlowManager`] owns every flow, one scheduler per lower-layer port
//! and one receive buffer per upper-layer port. It demultiplexes PDUs from
//! below to their flows, creating inbound flows on demand.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::buffer::BoundedQueue;
use crate::core::{
    Addr, AddressingMode, ArqStats, DeviceResolver, FlowId, FlowProperties, GdtpError, PortId,
    Result, StatsMode, BROADCAST_ADDRESS, BROADCAST_ADDRESS_SHORT, DEFAULT_BELOW_PORT_ID,
    DEFAULT_BUFFER_SIZE, DEFAULT_DESTINATION_ADDRESS, DEFAULT_SOURCE_ADDRESS,
};
use crate::flow::{Flow, FlowParams, FlowSummary};
use crate::net::StaticDeviceResolver;
use crate::pdu::{Pdu, PduType};
use crate::rng::{self, IdGenerator};
use crate::scheduler::{Scheduler, SchedulerType};

/// Flow manager configuration.
#[derive(Clone)]
pub struct ManagerConfig {
    /// Source address of outbound flows in explicit mode.
    pub source_address: Addr,

    /// Destination address of outbound flows in explicit mode.
    pub destination_address: Addr,

    /// Capacity of every flow and port queue.
    pub buffer_size: usize,

    /// Properties of inbound flows with no matching outbound flow.
    pub default_properties: FlowProperties,

    /// Scheduler installed on the default lower-layer port.
    pub scheduler: SchedulerType,

    /// Flow id source. `None` uses the process-wide generator.
    pub id_generator: Option<Arc<IdGenerator>>,

    /// Address lookup for implicit addressing.
    pub device_resolver: Arc<dyn DeviceResolver>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            source_address: DEFAULT_SOURCE_ADDRESS,
            destination_address: DEFAULT_DESTINATION_ADDRESS,
            buffer_size: DEFAULT_BUFFER_SIZE,
            default_properties: FlowProperties::default(),
            scheduler: SchedulerType::Fifo,
            id_generator: None,
            device_resolver: Arc::new(StaticDeviceResolver::new()),
        }
    }
}

impl fmt::Debug for ManagerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerConfig")
            .field("source_address", &self.source_address)
            .field("destination_address", &self.destination_address)
            .field("buffer_size", &self.buffer_size)
            .field("default_properties", &self.default_properties)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct FlowTable {
    outbound: HashMap<FlowId, Arc<Flow>>,
    inbound: HashMap<(Addr, FlowId), Arc<Flow>>,
    destinations: BTreeSet<Addr>,
    source_address: Addr,
    destination_address: Addr,
    default_properties: FlowProperties,
}

/// State shared between the manager and its flows.
pub(crate) struct ManagerShared {
    table: RwLock<FlowTable>,
    schedulers: RwLock<HashMap<PortId, Arc<Scheduler>>>,
    above: RwLock<HashMap<PortId, Arc<BoundedQueue<Pdu>>>>,
    buffer_size: usize,
    ids: Arc<IdGenerator>,
    resolver: Arc<dyn DeviceResolver>,
}

impl fmt::Debug for ManagerShared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerShared")
            .field("buffer_size", &self.buffer_size)
            .finish_non_exhaustive()
    }
}

impl ManagerShared {
    /// Hand a ready flow to the scheduler of its below port.
    pub(crate) async fn mark_flow_as_ready(&self, flow: Arc<Flow>) -> Result<()> {
        let port = flow.below_port();
        let scheduler = self
            .schedulers
            .read()
            .await
            .get(&port)
            .cloned()
            .ok_or(GdtpError::UnknownPort(port))?;
        scheduler.add_flow(flow);
        Ok(())
    }

    /// Queue a PDU for the upper layer, waiting while the port buffer is full.
    pub(crate) async fn add_frame_for_above(&self, pdu: Pdu, port: PortId) -> Result<()> {
        let buffer = self
            .above
            .read()
            .await
            .get(&port)
            .cloned()
            .ok_or(GdtpError::UnknownPort(port))?;
        buffer.push(pdu).await;
        Ok(())
    }

    async fn above_buffer(&self, port: PortId) -> Arc<BoundedQueue<Pdu>> {
        if let Some(buffer) = self.above.read().await.get(&port) {
            return buffer.clone();
        }
        self.above
            .write()
            .await
            .entry(port)
            .or_insert_with(|| Arc::new(BoundedQueue::new(self.buffer_size)))
            .clone()
    }

    async fn scheduler(&self, port: PortId) -> Result<Arc<Scheduler>> {
        self.schedulers
            .read()
            .await
            .get(&port)
            .cloned()
            .ok_or(GdtpError::UnknownPort(port))
    }
}

/// Owns the flows, schedulers and upper-layer buffers of one node.
///
/// Cloning yields another handle to the same manager. Transmitter workers
/// stop once the last handle is dropped.
#[derive(Debug, Clone)]
pub struct FlowManager {
    shared: Arc<ManagerShared>,
}

impl Default for FlowManager {
    fn default() -> Self {
        Self::new(ManagerConfig::default())
    }
}

impl FlowManager {
    /// Create a manager with a scheduler on [`DEFAULT_BELOW_PORT_ID`].
    pub fn new(config: ManagerConfig) -> Self {
        let mut schedulers = HashMap::new();
        schedulers.insert(
            DEFAULT_BELOW_PORT_ID,
            Arc::new(Scheduler::new(config.scheduler)),
        );

        let table = FlowTable {
            outbound: HashMap::new(),
            inbound: HashMap::new(),
            destinations: BTreeSet::new(),
            source_address: config.source_address,
            destination_address: config.destination_address,
            default_properties: config.default_properties,
        };

        Self {
            shared: Arc::new(ManagerShared {
                table: RwLock::new(table),
                schedulers: RwLock::new(schedulers),
                above: RwLock::new(HashMap::new()),
                buffer_size: config.buffer_size.max(1),
                ids: config.id_generator.unwrap_or_else(rng::global),
                resolver: config.device_resolver,
            }),
        }
    }

    /// Accept PDUs for the default source address and both broadcast
    /// addresses.
    pub async fn initialize(&self) {
        let mut table = self.shared.table.write().await;
        let source = table.source_address;
        table.destinations.insert(source);
        table.destinations.insert(BROADCAST_ADDRESS);
        table.destinations.insert(BROADCAST_ADDRESS_SHORT);

        for addr in &table.destinations {
            info!(addr, "accepting incoming address");
        }
    }

    /// Log the status of every flow.
    pub async fn deinitialize(&self) {
        for summary in self.flow_summaries().await {
            info!(
                id = summary.id,
                direction = %summary.direction,
                src_addr = summary.src_addr,
                dest_addr = summary.dest_addr,
                sdus_from_above = summary.stats.sdus_from_above,
                sdus_for_above = summary.stats.sdus_for_above,
                pdus_for_below = summary.stats.pdus_for_below,
                retransmitted = summary.stats.retransmitted_pdus,
                lost = summary.stats.lost_pdus,
                fer = summary.stats.fer,
                "flow status"
            );
        }
    }

    /// Lifetime snapshot of every flow, outbound first, ordered by id.
    pub async fn flow_summaries(&self) -> Vec<FlowSummary> {
        let table = self.shared.table.read().await;
        let mut outbound: Vec<_> = table.outbound.values().map(|f| f.summary()).collect();
        let mut inbound: Vec<_> = table.inbound.values().map(|f| f.summary()).collect();
        outbound.sort_by_key(|s| s.id);
        inbound.sort_by_key(|s| (s.src_addr, s.id));
        outbound.extend(inbound);
        outbound
    }

    /// Create an outbound flow towards application id `dest_id`.
    ///
    /// Returns the randomly chosen local source id.
    #[tracing::instrument(skip(self, props))]
    pub async fn allocate_flow(&self, dest_id: FlowId, props: FlowProperties) -> Result<FlowId> {
        props.validate()?;

        let mut table = self.shared.table.write().await;
        if table.outbound.values().any(|flow| flow.dest_id() == dest_id) {
            return Err(GdtpError::DuplicateFlow(dest_id));
        }

        let src_id = self
            .shared
            .ids
            .pick_free(|id| table.outbound.contains_key(&id))
            .ok_or(GdtpError::FlowIdsExhausted)?;

        let src_addr = match props.addressing_mode {
            AddressingMode::Explicit => table.source_address,
            AddressingMode::Implicit => self.shared.resolver.resolve(&props.addr_dev)?,
        };

        let flow = Flow::outbound(
            Arc::downgrade(&self.shared),
            FlowParams {
                src_id,
                dest_id,
                src_addr,
                dest_addr: table.destination_address,
                props,
                above_port: dest_id,
                below_port: DEFAULT_BELOW_PORT_ID,
                capacity: self.shared.buffer_size,
            },
        );
        info!(src_id, dest_id, "created outbound flow");
        table.outbound.insert(src_id, flow);

        if table.destinations.insert(src_addr) {
            info!(addr = src_addr, "accepting incoming address");
        }
        drop(table);

        self.shared.above_buffer(dest_id).await;
        Ok(src_id)
    }

    /// Replace the properties of an outbound flow.
    pub async fn modify_properties(&self, id: FlowId, props: FlowProperties) -> Result<()> {
        self.outbound_flow(id).await?.set_properties(props)
    }

    /// Queue an SDU on an outbound flow.
    pub async fn handle_sdu_from_above(&self, sdu: Bytes, id: FlowId) -> Result<()> {
        let flow = self.outbound_flow(id).await?;
        flow.handle_frame_from_above(sdu).await
    }

    /// Dispatch a PDU received on lower-layer port `port`.
    ///
    /// Returns `Ok(false)` if the PDU is not addressed to this node.
    #[tracing::instrument(
        skip(self, pdu),
        fields(src_id = pdu.src_id, dest_id = pdu.dest_id, seq_no = pdu.seq_no)
    )]
    pub async fn handle_pdu_from_below(&self, port: PortId, pdu: Pdu) -> Result<bool> {
        if !self.accepts_destination(pdu.dest_addr).await {
            debug!(dest_addr = pdu.dest_addr, "ignoring PDU for other node");
            return Ok(false);
        }

        let flow = match pdu.pdu_type {
            PduType::Data | PduType::Broadcast => self.find_or_create_inbound(&pdu, port).await,
            PduType::Ack => self.outbound_flow(pdu.dest_id).await.map_err(|_| {
                GdtpError::protocol(format!("ack for unknown flow {}", pdu.dest_id))
            })?,
        };

        flow.handle_frame_from_below(pdu).await?;
        Ok(true)
    }

    /// Register a flow with the scheduler of its below port.
    pub async fn mark_flow_as_ready(&self, flow: Arc<Flow>) -> Result<()> {
        self.shared.mark_flow_as_ready(flow).await
    }

    /// Queue a PDU on an upper-layer port.
    pub async fn add_frame_for_above(&self, pdu: Pdu, port: PortId) -> Result<()> {
        self.shared.add_frame_for_above(pdu, port).await
    }

    /// Next batch of PDUs for lower-layer port `port`. Waits for a ready flow.
    pub async fn get_pdus_for_below(&self, port: PortId) -> Result<Vec<Pdu>> {
        let scheduler = self.shared.scheduler(port).await?;
        scheduler.get_pdus_for_below().await
    }

    /// The lower layer finished sending the last batch on `port`.
    pub async fn set_frame_transmitted(&self, port: PortId) -> Result<()> {
        self.shared.scheduler(port).await?.set_pdus_transmitted()
    }

    /// Whether a flow is waiting on lower-layer port `port`.
    pub async fn has_pdu_for_below(&self, port: PortId) -> Result<bool> {
        Ok(self.shared.scheduler(port).await?.has_waiting_flow())
    }

    /// Whether SDUs are waiting on upper-layer port `port`.
    pub async fn has_sdu_for_above(&self, port: PortId) -> Result<bool> {
        self.shared
            .above
            .read()
            .await
            .get(&port)
            .map(|buffer| !buffer.is_empty())
            .ok_or(GdtpError::UnknownPort(port))
    }

    /// Next SDU on upper-layer port `port`, waiting until one arrives.
    pub async fn get_sdu_for_above(&self, port: PortId) -> Bytes {
        let buffer = self.shared.above_buffer(port).await;
        buffer.pop().await.payload
    }

    /// Statistics of flow `id`.
    ///
    /// Outbound flows are matched by their source id; otherwise the first
    /// inbound flow whose destination id is `id` is used.
    pub async fn get_stats(&self, id: FlowId, mode: StatsMode) -> Result<ArqStats> {
        let table = self.shared.table.read().await;
        if let Some(flow) = table.outbound.get(&id) {
            return Ok(flow.stats(mode));
        }
        table
            .inbound
            .values()
            .find(|flow| flow.dest_id() == id)
            .map(|flow| flow.stats(mode))
            .ok_or(GdtpError::UnknownFlow(id))
    }

    /// Replace the scheduler of a lower-layer port by name.
    ///
    /// Only [`DEFAULT_BELOW_PORT_ID`] is supported. Flows pending in the
    /// old scheduler are dropped from it.
    pub async fn set_scheduler_type(&self, port: PortId, name: &str) -> Result<()> {
        let kind: SchedulerType = name.parse()?;
        self.set_scheduler(port, kind).await
    }

    /// Replace the scheduler of a lower-layer port.
    pub async fn set_scheduler(&self, port: PortId, kind: SchedulerType) -> Result<()> {
        if port != DEFAULT_BELOW_PORT_ID {
            return Err(GdtpError::Configuration(format!(
                "scheduler replacement is only supported on port {DEFAULT_BELOW_PORT_ID}"
            )));
        }
        info!(port, scheduler = %kind, "installing scheduler");
        self.shared
            .schedulers
            .write()
            .await
            .insert(port, Arc::new(Scheduler::new(kind)));
        Ok(())
    }

    /// Scheduler serving lower-layer port `port`.
    pub async fn scheduler(&self, port: PortId) -> Result<Arc<Scheduler>> {
        self.shared.scheduler(port).await
    }

    /// Source address for flows allocated from now on.
    pub async fn set_default_source_address(&self, addr: Addr) {
        self.shared.table.write().await.source_address = addr;
    }

    /// Destination address for flows allocated from now on.
    pub async fn set_default_destination_address(&self, addr: Addr) {
        self.shared.table.write().await.destination_address = addr;
    }

    /// Properties for inbound flows created from now on.
    pub async fn set_default_flow_properties(&self, props: FlowProperties) -> Result<()> {
        props.validate()?;
        self.shared.table.write().await.default_properties = props;
        Ok(())
    }

    /// Whether PDUs addressed to `addr` are accepted.
    pub async fn accepts_destination(&self, addr: Addr) -> bool {
        self.shared.table.read().await.destinations.contains(&addr)
    }

    /// Outbound flow with source id `id`.
    pub async fn outbound_flow(&self, id: FlowId) -> Result<Arc<Flow>> {
        self.shared
            .table
            .read()
            .await
            .outbound
            .get(&id)
            .cloned()
            .ok_or(GdtpError::UnknownFlow(id))
    }

    /// Inbound flow from `peer` with the peer's source id `src_id`.
    pub async fn inbound_flow(&self, peer: Addr, src_id: FlowId) -> Option<Arc<Flow>> {
        self.shared
            .table
            .read()
            .await
            .inbound
            .get(&(peer, src_id))
            .cloned()
    }

    async fn find_or_create_inbound(&self, pdu: &Pdu, port: PortId) -> Arc<Flow> {
        let key = (pdu.src_addr, pdu.src_id);
        if let Some(flow) = self.shared.table.read().await.inbound.get(&key) {
            return flow.clone();
        }

        let flow = {
            let mut table = self.shared.table.write().await;
            if let Some(flow) = table.inbound.get(&key) {
                return flow.clone();
            }

            let props = match table
                .outbound
                .values()
                .find(|flow| flow.dest_id() == pdu.dest_id)
            {
                Some(local) => {
                    debug!(dest_id = pdu.dest_id, "inheriting properties of local flow");
                    local.properties()
                }
                None => table.default_properties.clone(),
            };

            let flow = Flow::inbound(
                Arc::downgrade(&self.shared),
                FlowParams {
                    src_id: pdu.src_id,
                    dest_id: pdu.dest_id,
                    src_addr: pdu.src_addr,
                    dest_addr: pdu.dest_addr,
                    props,
                    above_port: pdu.dest_id,
                    below_port: port,
                    capacity: self.shared.buffer_size,
                },
            );
            info!(
                src_id = pdu.src_id,
                dest_id = pdu.dest_id,
                peer = pdu.src_addr,
                "created inbound flow"
            );
            table.inbound.insert(key, flow.clone());
            flow
        };

        self.shared.above_buffer(pdu.dest_id).await;
        flow
    }
}
