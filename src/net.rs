//! Network helpers for implicit addressing.

use std::collections::HashMap;

use crate::core::{Addr, DeviceResolver, GdtpError};

/// Minimum IPv4 header length.
const IPV4_MIN_HEADER: usize = 20;

/// [`DeviceResolver`] backed by a fixed table.
#[derive(Debug, Clone, Default)]
pub struct StaticDeviceResolver {
    devices: HashMap<String, Addr>,
}

impl StaticDeviceResolver {
    /// Empty table. Every lookup fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a device entry.
    pub fn with_device(mut self, dev: impl Into<String>, addr: Addr) -> Self {
        self.devices.insert(dev.into(), addr);
        self
    }
}

impl DeviceResolver for StaticDeviceResolver {
    fn resolve(&self, dev: &str) -> Result<Addr, GdtpError> {
        self.devices
            .get(dev)
            .copied()
            .ok_or_else(|| GdtpError::Configuration(format!("no address for device {dev}")))
    }
}

/// Source and destination addresses of an IPv4 packet.
///
/// Returns `None` unless `packet` starts with a complete IPv4 header.
pub fn ipv4_addresses(packet: &[u8]) -> Option<(Addr, Addr)> {
    if packet.len() < IPV4_MIN_HEADER || packet[0] >> 4 != 4 {
        return None;
    }
    let src = u32::from_be_bytes([packet[12], packet[13], packet[14], packet[15]]);
    let dest = u32::from_be_bytes([packet[16], packet[17], packet[18], packet[19]]);
    Some((Addr::from(src), Addr::from(dest)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ipv4_header(src: [u8; 4], dest: [u8; 4]) -> Vec<u8> {
        let mut packet = vec![0u8; IPV4_MIN_HEADER];
        packet[0] = 0x45;
        packet[12..16].copy_from_slice(&src);
        packet[16..20].copy_from_slice(&dest);
        packet
    }

    #[test]
    fn test_static_resolver() {
        let resolver = StaticDeviceResolver::new().with_device("tun0", 0x0a00_0001);
        assert_eq!(resolver.resolve("tun0").unwrap(), 0x0a00_0001);
        assert!(resolver.resolve("eth9").unwrap_err().is_configuration());
    }

    #[test]
    fn test_ipv4_addresses() {
        let packet = ipv4_header([10, 0, 0, 1], [10, 0, 0, 2]);
        assert_eq!(ipv4_addresses(&packet), Some((0x0a00_0001, 0x0a00_0002)));
    }

    #[test]
    fn test_not_ipv4() {
        let mut packet = ipv4_header([10, 0, 0, 1], [10, 0, 0, 2]);
        packet[0] = 0x60;
        assert_eq!(ipv4_addresses(&packet), None);
        assert_eq!(ipv4_addresses(&[0x45; 10]), None);
    }
}
