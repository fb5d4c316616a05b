//! Network interface types

use crate::{is_link_local, Error, MacAddr};
use pnet_datalink::{self, NetworkInterface};
use std::fmt;
use std::net::Ipv6Addr;

/// Default Ethernet MTU, used when the kernel does not report one
pub const DEFAULT_MTU: u32 = 1500;

/// Network interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    /// Interface name (e.g., "eth0")
    pub name: String,
    /// Interface index
    pub index: u32,
    /// MAC address
    pub mac_address: MacAddr,
    /// MTU (Maximum Transmission Unit)
    pub mtu: u32,
    /// Is interface up?
    pub is_up: bool,
    /// IPv6 addresses assigned to the interface
    pub ipv6: Vec<Ipv6Addr>,
}

impl Interface {
    /// Create a new interface
    pub fn new(name: String, index: u32, mac_address: MacAddr) -> Self {
        Self {
            name,
            index,
            mac_address,
            mtu: DEFAULT_MTU,
            is_up: true,
            ipv6: Vec::new(),
        }
    }

    /// Get interface by name
    pub fn by_name(name: &str) -> Result<Self, Error> {
        pnet_datalink::interfaces()
            .into_iter()
            .find(|i| i.name == name)
            .map(Self::from_pnet)
            .ok_or_else(|| Error::InterfaceNotFound(name.to_string()))
    }

    /// List all available interfaces
    pub fn list_all() -> Vec<Self> {
        pnet_datalink::interfaces()
            .into_iter()
            .map(Self::from_pnet)
            .collect()
    }

    fn from_pnet(iface: NetworkInterface) -> Self {
        let mac_bytes = if let Some(mac) = iface.mac {
            [mac.0, mac.1, mac.2, mac.3, mac.4, mac.5]
        } else {
            [0, 0, 0, 0, 0, 0]
        };

        let ipv6 = iface
            .ips
            .iter()
            .filter_map(|net| match net {
                ipnetwork::IpNetwork::V6(v6) => Some(v6.ip()),
                ipnetwork::IpNetwork::V4(_) => None,
            })
            .collect();

        Self {
            mtu: read_mtu(&iface.name).unwrap_or(DEFAULT_MTU),
            is_up: iface.is_up(),
            name: iface.name,
            index: iface.index,
            mac_address: MacAddr(mac_bytes),
            ipv6,
        }
    }

    /// First link-local (fe80::/10) address of this interface
    pub fn link_local_ipv6(&self) -> Option<Ipv6Addr> {
        self.ipv6.iter().copied().find(is_link_local)
    }

    /// Largest frame, Ethernet header included, this interface accepts
    pub fn max_frame_len(&self) -> usize {
        self.mtu as usize + 14
    }
}

/// pnet does not expose the MTU, so read it from sysfs.
fn read_mtu(name: &str) -> Option<u32> {
    std::fs::read_to_string(format!("/sys/class/net/{}/mtu", name))
        .ok()?
        .trim()
        .parse()
        .ok()
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (index {}, {}), MTU: {}",
            self.name, self.index, self.mac_address, self.mtu
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_interface() {
        let err = Interface::by_name("ndforge-nope0").unwrap_err();
        assert!(matches!(err, Error::InterfaceNotFound(ref n) if n == "ndforge-nope0"));
        assert!(err.is_interface_error());
    }

    #[test]
    fn test_link_local_selection() {
        let mut iface = Interface::new("test0".into(), 3, MacAddr([0x02, 0, 0, 0, 0, 1]));
        assert_eq!(iface.link_local_ipv6(), None);

        iface.ipv6 = vec![
            "2001:db8::5".parse().unwrap(),
            "fe80::5".parse().unwrap(),
        ];
        assert_eq!(iface.link_local_ipv6(), Some("fe80::5".parse().unwrap()));
        assert_eq!(iface.max_frame_len(), 1514);
    }

    #[test]
    fn test_display() {
        let iface = Interface::new("test0".into(), 3, MacAddr([0x02, 0, 0, 0, 0, 1]));
        assert_eq!(
            iface.to_string(),
            "test0 (index 3, 02:00:00:00:00:01), MTU: 1500"
        );
    }
}
