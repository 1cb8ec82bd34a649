//! Network interface types

use crate::{Error, MacAddr, PacketSink, Result};
use ipnetwork::IpNetwork;
use parking_lot::Mutex;
use pnet_datalink::{self, Channel, DataLinkSender, NetworkInterface};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Network interface the engines operate on
#[derive(Debug, Clone)]
pub struct Interface {
    /// Interface name (e.g., "eth0", "en0")
    pub name: String,
    /// Interface index
    pub index: u32,
    /// MAC address
    pub mac_address: MacAddr,
    /// First IPv4 address assigned to the interface
    pub ipv4: Option<Ipv4Addr>,
    /// IPv6 address, link-local preferred
    pub ipv6: Option<Ipv6Addr>,
    /// Is interface up?
    pub is_up: bool,
    pub is_loopback: bool,
}

impl Interface {
    /// Create a new interface without addresses
    pub fn new(name: impl Into<String>, index: u32, mac_address: MacAddr) -> Self {
        Self {
            name: name.into(),
            index,
            mac_address,
            ipv4: None,
            ipv6: None,
            is_up: true,
            is_loopback: false,
        }
    }

    pub fn with_ipv4(mut self, ip: Ipv4Addr) -> Self {
        self.ipv4 = Some(ip);
        self
    }

    pub fn with_ipv6(mut self, ip: Ipv6Addr) -> Self {
        self.ipv6 = Some(ip);
        self
    }

    /// Get interface by name
    pub fn by_name(name: &str) -> Result<Self> {
        pnet_datalink::interfaces()
            .iter()
            .find(|i| i.name == name)
            .map(Self::from)
            .ok_or_else(|| Error::InterfaceNotFound(name.to_string()))
    }

    /// List all available interfaces
    pub fn list_all() -> Vec<Self> {
        pnet_datalink::interfaces().iter().map(Self::from).collect()
    }

    /// First interface that is up, not loopback and carries an IPv4 address
    pub fn default_interface() -> Result<Self> {
        Self::list_all()
            .into_iter()
            .find(|iface| iface.is_up && !iface.is_loopback && iface.ipv4.is_some())
            .ok_or_else(|| Error::Interface("No suitable default interface found".to_string()))
    }

    /// Open a raw link-layer sender on this interface
    pub fn open_sink(&self) -> Result<InterfaceSink> {
        let interface = pnet_datalink::interfaces()
            .into_iter()
            .find(|iface| iface.name == self.name)
            .ok_or_else(|| Error::InterfaceNotFound(self.name.clone()))?;

        let tx = match pnet_datalink::channel(&interface, Default::default()) {
            Ok(Channel::Ethernet(tx, _rx)) => tx,
            Ok(_) => return Err(Error::Interface("Unsupported channel type".to_string())),
            Err(e) => return Err(Error::Interface(format!("Failed to create channel: {}", e))),
        };

        Ok(InterfaceSink {
            interface: self.name.clone(),
            tx: Mutex::new(tx),
        })
    }
}

impl From<&NetworkInterface> for Interface {
    fn from(iface: &NetworkInterface) -> Self {
        let mac_address = iface
            .mac
            .map(|mac| MacAddr([mac.0, mac.1, mac.2, mac.3, mac.4, mac.5]))
            .unwrap_or_else(MacAddr::zero);

        let ipv4 = iface.ips.iter().find_map(|net| match net {
            IpNetwork::V4(v4) => Some(v4.ip()),
            IpNetwork::V6(_) => None,
        });

        let v6: Vec<Ipv6Addr> = iface
            .ips
            .iter()
            .filter_map(|net| match net {
                IpNetwork::V6(v6) => Some(v6.ip()),
                IpNetwork::V4(_) => None,
            })
            .collect();
        let ipv6 = v6
            .iter()
            .copied()
            .find(is_link_local)
            .or_else(|| v6.first().copied());

        Self {
            name: iface.name.clone(),
            index: iface.index,
            mac_address,
            ipv4,
            ipv6,
            is_up: iface.is_up(),
            is_loopback: iface.is_loopback(),
        }
    }
}

/// fe80::/10
pub fn is_link_local(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xffc0) == 0xfe80
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.mac_address)?;
        if let Some(ip) = self.ipv4 {
            write!(f, " {}", ip)?;
        }
        if let Some(ip) = self.ipv6 {
            write!(f, " {}", ip)?;
        }
        Ok(())
    }
}

/// Persistent raw sender shared by every engine on one interface
pub struct InterfaceSink {
    interface: String,
    tx: Mutex<Box<dyn DataLinkSender>>,
}

impl PacketSink for InterfaceSink {
    fn send(&self, frame: &[u8]) -> Result<()> {
        let mut tx = self.tx.lock();
        tx.send_to(frame, None)
            .ok_or_else(|| {
                Error::Interface(format!("Failed to send packet on {}", self.interface))
            })?
            .map_err(Error::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_local_detection() {
        assert!(is_link_local(&"fe80::1".parse().unwrap()));
        assert!(is_link_local(&"febf::1".parse().unwrap()));
        assert!(!is_link_local(&"fec0::1".parse().unwrap()));
        assert!(!is_link_local(&"2001:db8::1".parse().unwrap()));
    }

    #[test]
    fn test_interface_builder() {
        let iface = Interface::new("eth0", 2, MacAddr::new([1, 2, 3, 4, 5, 6]))
            .with_ipv4(Ipv4Addr::new(10, 0, 0, 5));
        assert_eq!(iface.ipv4, Some(Ipv4Addr::new(10, 0, 0, 5)));
        assert!(iface.ipv6.is_none());
        assert_eq!(iface.to_string(), "eth0 (01:02:03:04:05:06) 10.0.0.5");
    }
}
