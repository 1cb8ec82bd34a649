//! Layered packet builder
//!
//! The builder holds a link layer, one network layer (ARP, IPv4 or IPv6), an
//! optional transport layer and an application payload, and serializes them
//! bottom-up into one contiguous frame. It owns all of its inputs and touches
//! no shared state, so engines build concurrently without coordination.

use crate::arp::ArpPacket;
use crate::checksum::PseudoHeader;
use crate::ethernet::{EtherType, EthernetFrame};
use crate::icmpv6::Icmpv6Message;
use crate::ip::{IpProtocol, Ipv4Packet, Ipv6Packet};
use crate::udp::{UdpDatagram, UdpPort};
use netspoof_core::{Error, MacAddr, Result};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

#[derive(Debug, Clone)]
enum Layer2 {
    Ethernet { src: MacAddr, dst: MacAddr },
}

#[derive(Debug, Clone)]
enum Layer3 {
    Arp(ArpPacket),
    Ipv4 {
        src: Ipv4Addr,
        dst: Ipv4Addr,
        ttl: u8,
    },
    Ipv6 {
        src: Ipv6Addr,
        dst: Ipv6Addr,
        hop_limit: u8,
    },
}

#[derive(Debug, Clone)]
enum Layer4 {
    Udp { src_port: u16, dst_port: u16 },
    Icmpv6(Icmpv6Message),
}

/// Packet builder with fluent API
///
/// # Examples
///
/// ```
/// use std::net::Ipv4Addr;
/// use netspoof_core::MacAddr;
/// use netspoof_packet::PacketBuilder;
///
/// let frame = PacketBuilder::new()
///     .ethernet(MacAddr([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]), MacAddr::broadcast())
///     .ipv4(Ipv4Addr::new(192, 168, 1, 1), Ipv4Addr::new(192, 168, 1, 2))
///     .udp(53, 40000)
///     .payload(vec![0u8; 12])
///     .build()
///     .unwrap();
/// assert_eq!(&frame[12..14], &[0x08, 0x00]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PacketBuilder {
    layer2: Option<Layer2>,
    layer3: Option<Layer3>,
    layer4: Option<Layer4>,
    payload: Vec<u8>,
}

impl PacketBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an Ethernet layer; the EtherType follows from the network layer
    pub fn ethernet(mut self, src: MacAddr, dst: MacAddr) -> Self {
        self.layer2 = Some(Layer2::Ethernet { src, dst });
        self
    }

    /// Use an ARP packet as the network layer
    pub fn arp(mut self, packet: ArpPacket) -> Self {
        self.layer3 = Some(Layer3::Arp(packet));
        self
    }

    /// Use IPv4 as the network layer (TTL 64)
    pub fn ipv4(mut self, src: Ipv4Addr, dst: Ipv4Addr) -> Self {
        self.layer3 = Some(Layer3::Ipv4 { src, dst, ttl: 64 });
        self
    }

    /// Use IPv6 as the network layer (hop limit 64)
    pub fn ipv6(mut self, src: Ipv6Addr, dst: Ipv6Addr) -> Self {
        self.layer3 = Some(Layer3::Ipv6 {
            src,
            dst,
            hop_limit: 64,
        });
        self
    }

    /// Use whichever IP version the address pair belongs to
    pub fn ip(self, src: IpAddr, dst: IpAddr) -> Result<Self> {
        match (src, dst) {
            (IpAddr::V4(src), IpAddr::V4(dst)) => Ok(self.ipv4(src, dst)),
            (IpAddr::V6(src), IpAddr::V6(dst)) => Ok(self.ipv6(src, dst)),
            _ => Err(Error::construction(format!(
                "address family mismatch: {} -> {}",
                src, dst
            ))),
        }
    }

    /// Set the IPv4 TTL or IPv6 hop limit
    ///
    /// Must be called after `ipv4()`/`ipv6()`.
    pub fn hop_limit(mut self, value: u8) -> Self {
        match self.layer3 {
            Some(Layer3::Ipv4 { ref mut ttl, .. }) => *ttl = value,
            Some(Layer3::Ipv6 {
                ref mut hop_limit, ..
            }) => *hop_limit = value,
            _ => {}
        }
        self
    }

    pub fn udp(mut self, src_port: u16, dst_port: u16) -> Self {
        self.layer4 = Some(Layer4::Udp { src_port, dst_port });
        self
    }

    pub fn icmpv6(mut self, message: Icmpv6Message) -> Self {
        self.layer4 = Some(Layer4::Icmpv6(message));
        self
    }

    /// Set the application payload
    pub fn payload(mut self, data: Vec<u8>) -> Self {
        self.payload = data;
        self
    }

    /// Serialize all layers into a single frame
    pub fn build(self) -> Result<Vec<u8>> {
        let Layer2::Ethernet {
            src: src_mac,
            dst: dst_mac,
        } = self
            .layer2
            .ok_or_else(|| Error::construction("Layer 2 is required"))?;
        let layer3 = self
            .layer3
            .ok_or_else(|| Error::construction("a network layer is required"))?;

        let (ethertype, l3_bytes) = match layer3 {
            Layer3::Arp(packet) => {
                if self.layer4.is_some() || !self.payload.is_empty() {
                    return Err(Error::construction("ARP carries no upper layers"));
                }
                (EtherType::ARP, packet.serialize())
            }
            Layer3::Ipv4 { src, dst, ttl } => {
                let pseudo = PseudoHeader::V4 {
                    source: src,
                    destination: dst,
                };
                let (protocol, segment) = transport(self.layer4, self.payload, &pseudo)?;
                let packet = Ipv4Packet::new(src, dst, protocol, segment).with_ttl(ttl);
                (EtherType::IPv4, packet.to_bytes())
            }
            Layer3::Ipv6 {
                src,
                dst,
                hop_limit,
            } => {
                let pseudo = PseudoHeader::V6 {
                    source: src,
                    destination: dst,
                };
                let (protocol, segment) = transport(self.layer4, self.payload, &pseudo)?;
                let packet =
                    Ipv6Packet::new(src, dst, protocol, segment).with_hop_limit(hop_limit);
                (EtherType::IPv6, packet.to_bytes())
            }
        };

        Ok(EthernetFrame::new(dst_mac, src_mac, ethertype, l3_bytes).to_bytes())
    }
}

fn transport(
    layer4: Option<Layer4>,
    payload: Vec<u8>,
    pseudo: &PseudoHeader,
) -> Result<(IpProtocol, Vec<u8>)> {
    match layer4 {
        Some(Layer4::Udp { src_port, dst_port }) => {
            let mut datagram =
                UdpDatagram::new(UdpPort::new(src_port), UdpPort::new(dst_port), payload);
            datagram.calculate_checksum(pseudo);
            Ok((IpProtocol::UDP, datagram.to_bytes()))
        }
        Some(Layer4::Icmpv6(message)) => {
            if !matches!(pseudo, PseudoHeader::V6 { .. }) {
                return Err(Error::construction("ICMPv6 requires an IPv6 layer"));
            }
            if !payload.is_empty() {
                return Err(Error::construction("ICMPv6 body is carried by the message"));
            }
            Ok((IpProtocol::ICMPv6, message.to_bytes(pseudo)))
        }
        None => Err(Error::construction("a transport layer is required over IP")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icmpv6::{NeighborAdvertisement, ND_HOP_LIMIT};

    const SRC_MAC: MacAddr = MacAddr([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    const DST_MAC: MacAddr = MacAddr([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

    #[test]
    fn test_build_arp_frame() {
        let packet = ArpPacket::new_reply(
            SRC_MAC,
            Ipv4Addr::new(10, 0, 0, 1),
            DST_MAC,
            Ipv4Addr::new(10, 0, 0, 2),
        );
        let frame = PacketBuilder::new()
            .ethernet(SRC_MAC, DST_MAC)
            .arp(packet.clone())
            .build()
            .unwrap();

        assert_eq!(frame.len(), EthernetFrame::MIN_FRAME_SIZE);
        assert_eq!(&frame[0..6], DST_MAC.as_bytes());
        assert_eq!(&frame[12..14], &[0x08, 0x06]);
        assert_eq!(ArpPacket::parse(&frame[14..]).unwrap(), packet);
    }

    #[test]
    fn test_build_udp_over_ipv6() {
        let src: Ipv6Addr = "2001:db8::1".parse().unwrap();
        let dst: Ipv6Addr = "2001:db8::2".parse().unwrap();
        let frame = PacketBuilder::new()
            .ethernet(SRC_MAC, DST_MAC)
            .ipv6(src, dst)
            .udp(53, 5353)
            .payload(vec![1, 2, 3])
            .build()
            .unwrap();

        assert_eq!(&frame[12..14], &[0x86, 0xDD]);
        let ip = Ipv6Packet::from_bytes(&frame[14..]).unwrap();
        assert_eq!(ip.next_header, IpProtocol::UDP);
        let udp = UdpDatagram::from_bytes(&ip.payload).unwrap();
        assert_eq!(udp.destination_port.0, 5353);
        assert!(udp.validate_checksum(&PseudoHeader::V6 {
            source: src,
            destination: dst
        }));
    }

    #[test]
    fn test_build_icmpv6_with_hop_limit() {
        let src: Ipv6Addr = "fe80::1".parse().unwrap();
        let dst: Ipv6Addr = "fe80::2".parse().unwrap();
        let message = NeighborAdvertisement::new(src, false)
            .with_target_ll(SRC_MAC)
            .into_icmpv6();

        let frame = PacketBuilder::new()
            .ethernet(SRC_MAC, DST_MAC)
            .ipv6(src, dst)
            .hop_limit(ND_HOP_LIMIT)
            .icmpv6(message)
            .build()
            .unwrap();

        let ip = Ipv6Packet::from_bytes(&frame[14..]).unwrap();
        assert_eq!(ip.hop_limit, 255);
        assert_eq!(ip.next_header, IpProtocol::ICMPv6);
        let pseudo = PseudoHeader::V6 {
            source: src,
            destination: dst,
        };
        assert_eq!(pseudo.checksum(58, &ip.payload), 0);
    }

    #[test]
    fn test_build_requires_layers() {
        let err = PacketBuilder::new()
            .ipv4(Ipv4Addr::new(1, 1, 1, 1), Ipv4Addr::new(2, 2, 2, 2))
            .udp(1, 2)
            .build();
        assert!(err.is_err());

        let err = PacketBuilder::new()
            .ethernet(SRC_MAC, DST_MAC)
            .ipv4(Ipv4Addr::new(1, 1, 1, 1), Ipv4Addr::new(2, 2, 2, 2))
            .build();
        assert!(err.is_err());
    }

    #[test]
    fn test_icmpv6_over_ipv4_is_rejected() {
        let result = PacketBuilder::new()
            .ethernet(SRC_MAC, DST_MAC)
            .ipv4(Ipv4Addr::new(1, 1, 1, 1), Ipv4Addr::new(2, 2, 2, 2))
            .icmpv6(Icmpv6Message::new(128, 0, vec![]))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_ip_family_mismatch() {
        let result = PacketBuilder::new().ip(
            "10.0.0.1".parse().unwrap(),
            "fe80::1".parse().unwrap(),
        );
        assert!(result.is_err());
    }
}
