//! # GDTP
//!
//! **G**eneric **D**ata **T**ransfer **P**rotocol
//!
//! GDTP multiplexes many logical flows between two peers over an arbitrary
//! lower layer (radio link, UDP socket, TUN device). It provides:
//!
//! - **Reliability per flow**: stop-and-wait ARQ with timeouts and bounded
//!   retransmissions, or unreliable fire-and-forget
//! - **Scheduling**: FIFO, priority, and implicit acknowledgment (acks ride
//!   along with the next data PDU)
//! - **Broadcast**: flows addressed to a broadcast address bypass the ARQ
//! - **Statistics**: per-flow counters and frame error rate
//!
//! The crate does no I/O of its own. The lower layer pulls encoded frames
//! with [`Gdtp::get_data_for_below`], sends them, then confirms with
//! [`Gdtp::set_data_transmitted`]; received frames go in through
//! [`Gdtp::handle_data_from_below`].
//!
//! ## Modules
//!
//! - [`core`]: constants, properties, statistics, traits, and error types
//! - [`codec`]: the frame wire format
//! - [`arq`]: stop-and-wait transmitter and receiver
//! - [`flow`]: inbound and outbound flows
//! - [`scheduler`]: per-port flow scheduling
//! - [`manager`]: flow table and demultiplexing
//! - [`gdtp`]: the application-facing facade
//!
//! ## Example Usage
//!
//! ```rust
//! use gdtp::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> gdtp::Result<()> {
//! let alice = Gdtp::with_config(Gdtp::builder().source_address(1).destination_address(2).build());
//! let bob = Gdtp::with_config(Gdtp::builder().source_address(2).destination_address(1).build());
//! alice.initialize().await;
//! bob.initialize().await;
//!
//! let props = FlowProperties::builder().unreliable().build()?;
//! let id = alice.allocate_flow(7, props).await?;
//! alice.handle_data_from_above(Bytes::from_static(b"hello"), id).await?;
//!
//! let frame = alice.get_data_for_below(DEFAULT_BELOW_PORT_ID).await?;
//! alice.set_data_transmitted(DEFAULT_BELOW_PORT_ID).await?;
//! bob.handle_data_from_below(DEFAULT_BELOW_PORT_ID, &frame).await?;
//!
//! assert_eq!(bob.get_data_for_above(7).await, Bytes::from_static(b"hello"));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod arq;
pub mod buffer;
pub mod codec;
pub mod core;
pub mod flow;
pub mod gdtp;
pub mod manager;
pub mod net;
pub mod pdu;
pub mod rng;
pub mod scheduler;

/// Prelude module for convenient imports.
pub mod prelude {
    // Core traits and types
    pub use crate::core::*;

    pub use bytes::Bytes;

    pub use crate::codec::FrameCodec;
    pub use crate::flow::{Flow, FlowDirection, FlowKey, FlowSummary};
    pub use crate::gdtp::{Gdtp, GdtpBuilder, GdtpConfig};
    pub use crate::manager::{FlowManager, ManagerConfig};
    pub use crate::net::StaticDeviceResolver;
    pub use crate::pdu::{Pdu, PduType};
    pub use crate::scheduler::{Scheduler, SchedulerType};
}

// Re-export commonly used items at crate root
pub use crate::codec::FrameCodec;
pub use crate::core::{
    DecodeError, FlowId, FlowProperties, FlowStats, GdtpError, Result, StatsMode, TransferMode,
};
pub use crate::gdtp::{Gdtp, GdtpBuilder, GdtpConfig};
pub use crate::manager::{FlowManager, ManagerConfig};
pub use crate::pdu::{Pdu, PduType};
pub use crate::scheduler::SchedulerType;
