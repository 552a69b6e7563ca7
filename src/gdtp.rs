//! Application-facing facade.
//!
//! [`Gdtp`] wraps a [`FlowManager`] and a [`Codec`]. The application hands
//! it SDUs and receives them back per flow id; the lower layer exchanges
//! encoded frames with it per port.
//!
//! # Example
//!
//! ```rust,no_run
//! use gdtp::prelude::*;
//!
//! # async fn run() -> gdtp::Result<()> {
//! let config = Gdtp::builder()
//!     .source_address(1)
//!     .destination_address(2)
//!     .scheduler(SchedulerType::Priority)
//!     .build();
//!
//! let gdtp = Gdtp::with_config(config);
//! gdtp.initialize().await;
//!
//! let id = gdtp.allocate_flow(7, FlowProperties::default()).await?;
//! gdtp.handle_data_from_above(Bytes::from_static(b"hello"), id).await?;
//!
//! let frame = gdtp.get_data_for_below(DEFAULT_BELOW_PORT_ID).await?;
//! // ... send `frame` ...
//! gdtp.set_data_transmitted(DEFAULT_BELOW_PORT_ID).await?;
//! # let _ = frame;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::warn;

use crate::codec::FrameCodec;
use crate::core::{
    Addr, Codec, DeviceResolver, EncoderStats, FlowId, FlowProperties, FlowStats, PortId,
    Result, StatsMode,
};
use crate::manager::{FlowManager, ManagerConfig};
use crate::rng::IdGenerator;
use crate::scheduler::SchedulerType;

// ============================================================================
// Configuration
// ============================================================================

/// Facade configuration.
#[derive(Clone)]
pub struct GdtpConfig {
    /// Flow manager settings, including the initial scheduler.
    pub manager: ManagerConfig,

    /// Frame codec shared by both directions.
    pub codec: Arc<dyn Codec>,
}

impl Default for GdtpConfig {
    fn default() -> Self {
        Self {
            manager: ManagerConfig::default(),
            codec: Arc::new(FrameCodec::new()),
        }
    }
}

impl fmt::Debug for GdtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GdtpConfig")
            .field("manager", &self.manager)
            .finish_non_exhaustive()
    }
}

/// Builder for [`GdtpConfig`].
#[derive(Debug)]
pub struct GdtpBuilder {
    config: GdtpConfig,
}

impl GdtpBuilder {
    /// Create a builder holding the default configuration.
    pub fn new() -> Self {
        Self {
            config: GdtpConfig::default(),
        }
    }

    /// Source address of flows in explicit addressing mode.
    pub fn source_address(mut self, addr: Addr) -> Self {
        self.config.manager.source_address = addr;
        self
    }

    /// Destination address of flows in explicit addressing mode.
    pub fn destination_address(mut self, addr: Addr) -> Self {
        self.config.manager.destination_address = addr;
        self
    }

    /// Capacity of every flow and port queue.
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.manager.buffer_size = size;
        self
    }

    /// Properties of inbound flows with no matching outbound flow.
    pub fn default_properties(mut self, props: FlowProperties) -> Self {
        self.config.manager.default_properties = props;
        self
    }

    /// Scheduler of the default lower-layer port.
    pub fn scheduler(mut self, kind: SchedulerType) -> Self {
        self.config.manager.scheduler = kind;
        self
    }

    /// Draw flow ids from a generator seeded with `seed`.
    pub fn id_seed(mut self, seed: u64) -> Self {
        self.config.manager.id_generator = Some(Arc::new(IdGenerator::from_seed(seed)));
        self
    }

    /// Draw flow ids from `generator`.
    pub fn id_generator(mut self, generator: Arc<IdGenerator>) -> Self {
        self.config.manager.id_generator = Some(generator);
        self
    }

    /// Address lookup for implicit addressing.
    pub fn device_resolver(mut self, resolver: impl DeviceResolver) -> Self {
        self.config.manager.device_resolver = Arc::new(resolver);
        self
    }

    /// Replace the frame codec.
    pub fn codec(mut self, codec: impl Codec) -> Self {
        self.config.codec = Arc::new(codec);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> GdtpConfig {
        self.config
    }
}

impl Default for GdtpBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Facade
// ============================================================================

/// One protocol instance.
///
/// Cloning yields another handle to the same instance.
#[derive(Clone)]
pub struct Gdtp {
    manager: FlowManager,
    codec: Arc<dyn Codec>,
    encoder: Arc<Mutex<EncoderStats>>,
}

impl fmt::Debug for Gdtp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gdtp")
            .field("manager", &self.manager)
            .field("encoder", &*self.encoder.lock())
            .finish_non_exhaustive()
    }
}

impl Default for Gdtp {
    fn default() -> Self {
        Self::new()
    }
}

impl Gdtp {
    /// Instance with the default configuration.
    pub fn new() -> Self {
        Self::with_config(GdtpConfig::default())
    }

    /// Instance with `config`.
    pub fn with_config(config: GdtpConfig) -> Self {
        Self {
            manager: FlowManager::new(config.manager),
            codec: config.codec,
            encoder: Arc::new(Mutex::new(EncoderStats::default())),
        }
    }

    /// Start building a configuration.
    pub fn builder() -> GdtpBuilder {
        GdtpBuilder::new()
    }

    /// The underlying flow manager.
    pub fn manager(&self) -> &FlowManager {
        &self.manager
    }

    /// Start accepting PDUs for the default source and broadcast addresses.
    pub async fn initialize(&self) {
        self.manager.initialize().await;
    }

    /// Log the status of every flow.
    pub async fn deinitialize(&self) {
        self.manager.deinitialize().await;
    }

    /// Install a scheduler by name (`fifo`, `priority` or `implicitack`).
    pub async fn set_scheduler_type(&self, name: &str, port: PortId) -> Result<()> {
        self.manager.set_scheduler_type(port, name).await
    }

    /// Source address for flows allocated from now on.
    pub async fn set_default_source_address(&self, addr: Addr) {
        self.manager.set_default_source_address(addr).await;
    }

    /// Destination address for flows allocated from now on.
    pub async fn set_default_destination_address(&self, addr: Addr) {
        self.manager.set_default_destination_address(addr).await;
    }

    /// Properties for inbound flows created from now on.
    pub async fn set_default_flow_properties(&self, props: FlowProperties) -> Result<()> {
        self.manager.set_default_flow_properties(props).await
    }

    /// Create an outbound flow towards application id `id`.
    ///
    /// Returns the local flow id to send on.
    pub async fn allocate_flow(&self, id: FlowId, props: FlowProperties) -> Result<FlowId> {
        self.manager.allocate_flow(id, props).await
    }

    /// Replace the properties of flow `id`.
    pub async fn modify_properties(&self, id: FlowId, props: FlowProperties) -> Result<()> {
        self.manager.modify_properties(id, props).await
    }

    /// Statistics of flow `id` since the previous call.
    pub async fn get_stats(&self, id: FlowId) -> Result<FlowStats> {
        self.get_stats_with_mode(id, StatsMode::Running).await
    }

    /// Statistics of flow `id` over the requested window.
    pub async fn get_stats_with_mode(&self, id: FlowId, mode: StatsMode) -> Result<FlowStats> {
        let arq = self.manager.get_stats(id, mode).await?;
        Ok(FlowStats {
            arq,
            encoder: self.encoder_stats(),
        })
    }

    /// Codec counters of this instance.
    pub fn encoder_stats(&self) -> EncoderStats {
        self.encoder.lock().clone()
    }

    /// Send `payload` on flow `id`.
    ///
    /// Waits while the flow's transmit queue is full.
    pub async fn handle_data_from_above(&self, payload: Bytes, id: FlowId) -> Result<()> {
        let len = payload.len() as u64;
        self.manager.handle_sdu_from_above(payload, id).await?;
        self.encoder.lock().bytes_from_above += len;
        Ok(())
    }

    /// Decode a frame from lower-layer port `port` and dispatch its PDUs.
    ///
    /// Returns the number of PDUs accepted. A frame that fails to decode is
    /// counted and dropped.
    #[tracing::instrument(skip(self, frame), fields(len = frame.len()))]
    pub async fn handle_data_from_below(&self, port: PortId, frame: &[u8]) -> Result<usize> {
        {
            let mut encoder = self.encoder.lock();
            encoder.frames_from_below += 1;
            encoder.bytes_from_below += frame.len() as u64;
        }

        let pdus = match self.codec.decode(frame) {
            Ok(pdus) => pdus,
            Err(e) => {
                warn!(error = %e, "dropping malformed frame");
                self.encoder.lock().decode_errors += 1;
                return Ok(0);
            }
        };

        let mut dispatched = 0;
        for pdu in pdus {
            match self.manager.handle_pdu_from_below(port, pdu).await {
                Ok(true) => dispatched += 1,
                Ok(false) => {}
                Err(e) => warn!(error = %e, "dropping PDU"),
            }
        }
        Ok(dispatched)
    }

    /// Whether a frame is ready for lower-layer port `port`.
    pub async fn has_data_for_below(&self, port: PortId) -> Result<bool> {
        self.manager.has_pdu_for_below(port).await
    }

    /// Next encoded frame for lower-layer port `port`, waiting until one is
    /// ready.
    pub async fn get_data_for_below(&self, port: PortId) -> Result<Bytes> {
        let pdus = self.manager.get_pdus_for_below(port).await?;
        let frame = match self.codec.encode(&pdus) {
            Ok(frame) => frame,
            Err(e) => {
                let flows: Vec<FlowId> = pdus.iter().map(|pdu| pdu.src_id).collect();
                warn!(port, ?flows, error = %e, "dropping frame that failed to encode");
                // Treat the frame as lost on the link so the transmitters
                // move on instead of waiting for a send that never happens.
                if let Err(release) = self.manager.set_frame_transmitted(port).await {
                    warn!(port, error = %release, "failed to release flows of dropped frame");
                }
                return Err(e.into());
            }
        };

        let mut encoder = self.encoder.lock();
        encoder.frames_for_below += 1;
        encoder.bytes_for_below += frame.len() as u64;
        Ok(frame)
    }

    /// The frame last taken from `port` has been sent.
    pub async fn set_data_transmitted(&self, port: PortId) -> Result<()> {
        self.manager.set_frame_transmitted(port).await
    }

    /// Whether data is waiting for application id `id`.
    pub async fn has_data_for_above(&self, id: FlowId) -> Result<bool> {
        self.manager.has_sdu_for_above(id).await
    }

    /// Next payload for application id `id`, waiting until one arrives.
    pub async fn get_data_for_above(&self, id: FlowId) -> Bytes {
        let payload = self.manager.get_sdu_for_above(id).await;
        self.encoder.lock().bytes_for_above += payload.len() as u64;
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arq::{ArqEngine, ArqState};
    use crate::core::{DecodeError, DEFAULT_BELOW_PORT_ID};
    use crate::pdu::Pdu;

    struct OversizeCodec;

    impl Codec for OversizeCodec {
        fn encode(&self, _pdus: &[Pdu]) -> std::result::Result<Bytes, DecodeError> {
            Err(DecodeError::PayloadTooLarge)
        }

        fn decode(&self, data: &[u8]) -> std::result::Result<Vec<Pdu>, DecodeError> {
            FrameCodec::new().decode(data)
        }
    }

    fn node(src: Addr, dest: Addr) -> Gdtp {
        Gdtp::with_config(
            Gdtp::builder()
                .source_address(src)
                .destination_address(dest)
                .id_seed(u64::from(src))
                .build(),
        )
    }

    #[test]
    fn test_builder() {
        let config = Gdtp::builder()
            .source_address(4)
            .destination_address(5)
            .buffer_size(3)
            .scheduler(SchedulerType::ImplicitAck)
            .build();

        assert_eq!(config.manager.source_address, 4);
        assert_eq!(config.manager.destination_address, 5);
        assert_eq!(config.manager.buffer_size, 3);
        assert_eq!(config.manager.scheduler, SchedulerType::ImplicitAck);
        assert!(config.manager.id_generator.is_none());
    }

    #[tokio::test]
    async fn test_malformed_frame_is_counted() {
        let gdtp = node(1, 2);
        gdtp.initialize().await;

        let dispatched = gdtp
            .handle_data_from_below(DEFAULT_BELOW_PORT_ID, &[0xff, 0x00])
            .await
            .unwrap();
        assert_eq!(dispatched, 0);

        let stats = gdtp.encoder_stats();
        assert_eq!(stats.decode_errors, 1);
        assert_eq!(stats.frames_from_below, 1);
        assert_eq!(stats.bytes_from_below, 2);
    }

    #[tokio::test]
    async fn test_bad_pdu_does_not_abort_batch() {
        let gdtp = node(1, 2);
        gdtp.initialize().await;

        // An ack for a flow that does not exist, then a valid data PDU.
        let mut ack = Pdu::data(2, 1, 9, 3, 1, Bytes::new()).ack_for(1);
        ack.dest_addr = 1;
        let data = Pdu::data(2, 1, 9, 3, 1, Bytes::from_static(b"ok"));
        let frame = FrameCodec::new().encode(&[ack, data]).unwrap();

        let dispatched = gdtp
            .handle_data_from_below(DEFAULT_BELOW_PORT_ID, &frame)
            .await
            .unwrap();
        assert_eq!(dispatched, 1);
        assert_eq!(gdtp.get_data_for_above(3).await, Bytes::from_static(b"ok"));
        assert_eq!(gdtp.encoder_stats().bytes_for_above, 2);
    }

    #[tokio::test]
    async fn test_foreign_frame_not_counted() {
        let gdtp = node(1, 2);
        gdtp.initialize().await;

        let data = Pdu::data(2, 42, 9, 3, 1, Bytes::from_static(b"no"));
        let frame = FrameCodec::new().encode(&[data]).unwrap();
        let dispatched = gdtp
            .handle_data_from_below(DEFAULT_BELOW_PORT_ID, &frame)
            .await
            .unwrap();
        assert_eq!(dispatched, 0);
        assert_eq!(gdtp.encoder_stats().decode_errors, 0);
    }

    #[tokio::test]
    async fn test_unknown_scheduler_name() {
        let gdtp = node(1, 2);
        assert!(gdtp
            .set_scheduler_type("lottery", DEFAULT_BELOW_PORT_ID)
            .await
            .unwrap_err()
            .is_configuration());
    }

    #[tokio::test(start_paused = true)]
    async fn test_outgoing_frame_is_counted() {
        let gdtp = node(1, 2);
        gdtp.initialize().await;
        let id = gdtp
            .allocate_flow(3, FlowProperties::builder().unreliable().build().unwrap())
            .await
            .unwrap();

        gdtp.handle_data_from_above(Bytes::from_static(b"abcd"), id)
            .await
            .unwrap();
        let frame = gdtp.get_data_for_below(DEFAULT_BELOW_PORT_ID).await.unwrap();
        gdtp.set_data_transmitted(DEFAULT_BELOW_PORT_ID).await.unwrap();

        let stats = gdtp.get_stats(id).await.unwrap();
        assert_eq!(stats.encoder.frames_for_below, 1);
        assert_eq!(stats.encoder.bytes_for_below, frame.len() as u64);
        assert_eq!(stats.encoder.bytes_from_above, 4);
        assert_eq!(stats.arq.sdus_from_above, 1);

        let decoded = FrameCodec::new().decode(&frame).unwrap();
        assert_eq!(decoded[0].src_id, id);
        assert_eq!(decoded[0].dest_id, 3);
        assert_eq!(decoded[0].payload, Bytes::from_static(b"abcd"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_encode_failure_releases_flow() {
        let gdtp = Gdtp::with_config(
            Gdtp::builder()
                .source_address(1)
                .destination_address(2)
                .id_seed(1)
                .codec(OversizeCodec)
                .build(),
        );
        gdtp.initialize().await;
        let id = gdtp
            .allocate_flow(3, FlowProperties::builder().unreliable().build().unwrap())
            .await
            .unwrap();

        gdtp.handle_data_from_above(Bytes::from_static(b"abcd"), id)
            .await
            .unwrap();
        assert!(gdtp.get_data_for_below(DEFAULT_BELOW_PORT_ID).await.is_err());
        assert_eq!(gdtp.encoder_stats().frames_for_below, 0);

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let flow = gdtp.manager().outbound_flow(id).await.unwrap();
        match flow.engine() {
            ArqEngine::Transmitter(tx) => assert_eq!(tx.state(), ArqState::Finished),
            ArqEngine::Receiver(_) => panic!("outbound flow without transmitter"),
        }
        assert!(!gdtp
            .manager()
            .has_pdu_for_below(DEFAULT_BELOW_PORT_ID)
            .await
            .unwrap());
    }
}
