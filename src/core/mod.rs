//! Core types shared by every layer.

pub mod constants;
pub mod error;
pub mod properties;
pub mod stats;
pub mod traits;
pub mod types;

pub use constants::*;
pub use error::{DecodeError, GdtpError, Result};
pub use properties::{FlowProperties, FlowPropertiesBuilder};
pub use stats::{ArqStats, EncoderStats, FlowStats, StatsMode};
pub use traits::{Codec, DeviceResolver};
pub use types::{is_broadcast_addr, Addr, AddressingMode, FlowId, PortId, SeqNo, TransferMode};
