//! Flow properties.
//!
//! [`FlowProperties`] describe the characteristics of a flow such as its
//! degree of reliability, priority and ARQ timing. They are fixed at
//! allocation time and may be replaced at runtime as a whole.

use std::time::Duration;

use super::constants::{
    DEFAULT_ACK_TIMEOUT, DEFAULT_ADDR_DEV, DEFAULT_MAX_RETRANSMISSIONS, DEFAULT_MAX_SEQNO,
    DEFAULT_PRIORITY, MIN_MAX_SEQNO,
};
use super::error::GdtpError;
use super::types::{AddressingMode, SeqNo, TransferMode};

/// Characteristics of a flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowProperties {
    /// Reliable or unreliable delivery.
    pub transfer_mode: TransferMode,

    /// Scheduling priority. Lower values are served first.
    pub priority: u32,

    /// Explicit or implicit addressing.
    pub addressing_mode: AddressingMode,

    /// Sequence number modulus (must be at least 2).
    pub max_seqno: SeqNo,

    /// Time to wait for an acknowledgment before retransmitting.
    pub ack_timeout: Duration,

    /// Number of transmissions after which a PDU is declared lost.
    pub max_retransmissions: u32,

    /// Network device used to resolve the source address in implicit mode.
    pub addr_dev: String,
}

impl Default for FlowProperties {
    fn default() -> Self {
        Self {
            transfer_mode: TransferMode::Reliable,
            priority: DEFAULT_PRIORITY,
            addressing_mode: AddressingMode::Explicit,
            max_seqno: DEFAULT_MAX_SEQNO,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            max_retransmissions: DEFAULT_MAX_RETRANSMISSIONS,
            addr_dev: DEFAULT_ADDR_DEV.to_string(),
        }
    }
}

impl FlowProperties {
    /// Default properties with the given transfer mode.
    pub fn new(transfer_mode: TransferMode) -> Self {
        Self {
            transfer_mode,
            ..Self::default()
        }
    }

    /// Start building a set of properties from the defaults.
    pub fn builder() -> FlowPropertiesBuilder {
        FlowPropertiesBuilder::new()
    }

    /// Whether the flow acknowledges and retransmits.
    pub fn is_reliable(&self) -> bool {
        self.transfer_mode == TransferMode::Reliable
    }

    /// Check the invariants the ARQ engines rely on.
    pub fn validate(&self) -> Result<(), GdtpError> {
        if self.max_seqno < MIN_MAX_SEQNO {
            return Err(GdtpError::Configuration(format!(
                "max_seqno must be at least {MIN_MAX_SEQNO}, got {}",
                self.max_seqno
            )));
        }
        if self.max_retransmissions == 0 {
            return Err(GdtpError::Configuration(
                "max_retransmissions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`FlowProperties`].
#[derive(Debug, Default)]
pub struct FlowPropertiesBuilder {
    props: FlowProperties,
}

impl FlowPropertiesBuilder {
    /// Create a builder holding the default properties.
    pub fn new() -> Self {
        Self {
            props: FlowProperties::default(),
        }
    }

    /// Set the transfer mode.
    pub fn transfer_mode(mut self, mode: TransferMode) -> Self {
        self.props.transfer_mode = mode;
        self
    }

    /// Shorthand for `transfer_mode(TransferMode::Unreliable)`.
    pub fn unreliable(self) -> Self {
        self.transfer_mode(TransferMode::Unreliable)
    }

    /// Set the priority.
    pub fn priority(mut self, priority: u32) -> Self {
        self.props.priority = priority;
        self
    }

    /// Set the addressing mode.
    pub fn addressing_mode(mut self, mode: AddressingMode) -> Self {
        self.props.addressing_mode = mode;
        self
    }

    /// Set the sequence number modulus.
    pub fn max_seqno(mut self, max_seqno: SeqNo) -> Self {
        self.props.max_seqno = max_seqno;
        self
    }

    /// Set the acknowledgment timeout.
    pub fn ack_timeout(mut self, timeout: Duration) -> Self {
        self.props.ack_timeout = timeout;
        self
    }

    /// Set the transmission budget per PDU.
    pub fn max_retransmissions(mut self, max: u32) -> Self {
        self.props.max_retransmissions = max;
        self
    }

    /// Set the network device for implicit addressing.
    pub fn addr_dev(mut self, dev: impl Into<String>) -> Self {
        self.props.addr_dev = dev.into();
        self
    }

    /// Validate and return the properties.
    pub fn build(self) -> Result<FlowProperties, GdtpError> {
        self.props.validate()?;
        Ok(self.props)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_protocol() {
        let props = FlowProperties::default();
        assert!(props.is_reliable());
        assert_eq!(props.priority, 99);
        assert_eq!(props.max_seqno, 127);
        assert_eq!(props.ack_timeout, Duration::from_millis(100));
        assert_eq!(props.max_retransmissions, 7);
        assert_eq!(props.addr_dev, "tun0");
        assert!(props.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let props = FlowProperties::builder()
            .unreliable()
            .priority(3)
            .max_seqno(16)
            .ack_timeout(Duration::from_millis(250))
            .max_retransmissions(2)
            .addr_dev("eth0")
            .build()
            .unwrap();

        assert_eq!(props.transfer_mode, TransferMode::Unreliable);
        assert_eq!(props.priority, 3);
        assert_eq!(props.max_seqno, 16);
        assert_eq!(props.ack_timeout, Duration::from_millis(250));
        assert_eq!(props.max_retransmissions, 2);
        assert_eq!(props.addr_dev, "eth0");
    }

    #[test]
    fn test_invalid_max_seqno() {
        let err = FlowProperties::builder().max_seqno(1).build().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_invalid_retransmissions() {
        let err = FlowProperties::builder()
            .max_retransmissions(0)
            .build()
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
