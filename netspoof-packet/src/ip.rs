//! IPv4 and IPv6 packet construction and parsing

use crate::checksum::internet_checksum;
use bytes::{BufMut, BytesMut};
use std::net::{Ipv4Addr, Ipv6Addr};

/// IP protocol / next-header numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpProtocol {
    /// TCP (6)
    TCP,
    /// UDP (17)
    UDP,
    /// ICMPv6 (58)
    ICMPv6,
    Custom(u8),
}

impl IpProtocol {
    pub fn to_u8(self) -> u8 {
        match self {
            IpProtocol::TCP => 6,
            IpProtocol::UDP => 17,
            IpProtocol::ICMPv6 => 58,
            IpProtocol::Custom(val) => val,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            6 => IpProtocol::TCP,
            17 => IpProtocol::UDP,
            58 => IpProtocol::ICMPv6,
            val => IpProtocol::Custom(val),
        }
    }
}

/// IPv4 packet (options are carried but never generated)
#[derive(Debug, Clone)]
pub struct Ipv4Packet {
    /// Internet Header Length in 32-bit words (minimum 5)
    pub ihl: u8,
    pub tos: u8,
    pub identification: u16,
    pub dont_fragment: bool,
    pub ttl: u8,
    pub protocol: IpProtocol,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub options: Vec<u8>,
    pub payload: Vec<u8>,
}

impl Ipv4Packet {
    /// Minimum IPv4 header size (without options)
    pub const MIN_HEADER_SIZE: usize = 20;

    /// Create a new IPv4 packet with TTL 64 and DF set
    pub fn new(
        source: Ipv4Addr,
        destination: Ipv4Addr,
        protocol: IpProtocol,
        payload: Vec<u8>,
    ) -> Self {
        Ipv4Packet {
            ihl: 5,
            tos: 0,
            identification: 0,
            dont_fragment: true,
            ttl: 64,
            protocol,
            source,
            destination,
            options: Vec::new(),
            payload,
        }
    }

    pub fn with_ttl(mut self, ttl: u8) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_identification(mut self, id: u16) -> Self {
        self.identification = id;
        self
    }

    pub fn header_len(&self) -> usize {
        (self.ihl as usize) * 4
    }

    pub fn total_length(&self) -> u16 {
        (self.header_len() + self.payload.len()) as u16
    }

    fn header(&self, checksum: u16) -> BytesMut {
        let mut buffer = BytesMut::with_capacity(self.header_len());

        buffer.put_u8((4 << 4) | (self.ihl & 0x0F));
        buffer.put_u8(self.tos);
        buffer.put_u16(self.total_length());
        buffer.put_u16(self.identification);
        buffer.put_u16(if self.dont_fragment { 0x4000 } else { 0 });
        buffer.put_u8(self.ttl);
        buffer.put_u8(self.protocol.to_u8());
        buffer.put_u16(checksum);
        buffer.put_slice(&self.source.octets());
        buffer.put_slice(&self.destination.octets());
        buffer.put_slice(&self.options);

        buffer
    }

    /// Serialize with a freshly computed header checksum
    pub fn to_bytes(&self) -> Vec<u8> {
        let checksum = internet_checksum(&self.header(0));
        let mut buffer = self.header(checksum);
        buffer.put_slice(&self.payload);
        buffer.to_vec()
    }

    /// Parse an IPv4 packet, trimming link-layer padding past `total_length`
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::MIN_HEADER_SIZE || data[0] >> 4 != 4 {
            return None;
        }

        let ihl = data[0] & 0x0F;
        let header_len = (ihl as usize) * 4;
        let total_length = u16::from_be_bytes([data[2], data[3]]) as usize;
        if header_len < Self::MIN_HEADER_SIZE || total_length < header_len {
            return None;
        }
        if data.len() < total_length {
            return None;
        }

        let flags_and_offset = u16::from_be_bytes([data[6], data[7]]);

        Some(Ipv4Packet {
            ihl,
            tos: data[1],
            identification: u16::from_be_bytes([data[4], data[5]]),
            dont_fragment: flags_and_offset & 0x4000 != 0,
            ttl: data[8],
            protocol: IpProtocol::from_u8(data[9]),
            source: Ipv4Addr::new(data[12], data[13], data[14], data[15]),
            destination: Ipv4Addr::new(data[16], data[17], data[18], data[19]),
            options: data[Self::MIN_HEADER_SIZE..header_len].to_vec(),
            payload: data[header_len..total_length].to_vec(),
        })
    }
}

/// IPv6 packet (fixed header only; extension headers are not generated)
#[derive(Debug, Clone)]
pub struct Ipv6Packet {
    pub traffic_class: u8,
    /// 20-bit flow label
    pub flow_label: u32,
    pub next_header: IpProtocol,
    pub hop_limit: u8,
    pub source: Ipv6Addr,
    pub destination: Ipv6Addr,
    pub payload: Vec<u8>,
}

impl Ipv6Packet {
    pub const HEADER_SIZE: usize = 40;

    /// Create a new IPv6 packet with hop limit 64
    pub fn new(
        source: Ipv6Addr,
        destination: Ipv6Addr,
        next_header: IpProtocol,
        payload: Vec<u8>,
    ) -> Self {
        Ipv6Packet {
            traffic_class: 0,
            flow_label: 0,
            next_header,
            hop_limit: 64,
            source,
            destination,
            payload,
        }
    }

    /// Neighbor Discovery requires 255 (RFC 4861 §7.1)
    pub fn with_hop_limit(mut self, hop_limit: u8) -> Self {
        self.hop_limit = hop_limit;
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = BytesMut::with_capacity(Self::HEADER_SIZE + self.payload.len());

        let first_word = (6u32 << 28)
            | ((self.traffic_class as u32) << 20)
            | (self.flow_label & 0x000F_FFFF);
        buffer.put_u32(first_word);
        buffer.put_u16(self.payload.len() as u16);
        buffer.put_u8(self.next_header.to_u8());
        buffer.put_u8(self.hop_limit);
        buffer.put_slice(&self.source.octets());
        buffer.put_slice(&self.destination.octets());
        buffer.put_slice(&self.payload);

        buffer.to_vec()
    }

    /// Parse an IPv6 packet, trimming link-layer padding past the payload length
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::HEADER_SIZE || data[0] >> 4 != 6 {
            return None;
        }

        let first_word = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let payload_length = u16::from_be_bytes([data[4], data[5]]) as usize;
        let end = Self::HEADER_SIZE + payload_length;
        if data.len() < end {
            return None;
        }

        let mut source = [0u8; 16];
        source.copy_from_slice(&data[8..24]);
        let mut destination = [0u8; 16];
        destination.copy_from_slice(&data[24..40]);

        Some(Ipv6Packet {
            traffic_class: ((first_word >> 20) & 0xFF) as u8,
            flow_label: first_word & 0x000F_FFFF,
            next_header: IpProtocol::from_u8(data[6]),
            hop_limit: data[7],
            source: Ipv6Addr::from(source),
            destination: Ipv6Addr::from(destination),
            payload: data[Self::HEADER_SIZE..end].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::validate_checksum;

    #[test]
    fn test_ipv4_header_fields() {
        let packet = Ipv4Packet::new(
            Ipv4Addr::new(192, 168, 1, 1),
            Ipv4Addr::new(192, 168, 1, 2),
            IpProtocol::UDP,
            vec![0x01, 0x02, 0x03, 0x04],
        );
        let bytes = packet.to_bytes();

        assert_eq!(bytes[0], 0x45);
        assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]), 24);
        assert_eq!(bytes[6], 0x40);
        assert_eq!(bytes[8], 64);
        assert_eq!(bytes[9], 17);
        assert_eq!(&bytes[12..16], &[192, 168, 1, 1]);
        assert_eq!(&bytes[16..20], &[192, 168, 1, 2]);
        assert!(validate_checksum(&bytes[..20]));
    }

    #[test]
    fn test_ipv4_parse_trims_padding() {
        let packet = Ipv4Packet::new(
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 2),
            IpProtocol::UDP,
            vec![0xAB; 8],
        );
        let mut bytes = packet.to_bytes();
        bytes.extend_from_slice(&[0u8; 18]);

        let parsed = Ipv4Packet::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.payload, vec![0xAB; 8]);
        assert_eq!(parsed.protocol, IpProtocol::UDP);
        assert!(parsed.dont_fragment);
    }

    #[test]
    fn test_ipv4_parse_rejects_truncated() {
        let bytes = Ipv4Packet::new(
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 2),
            IpProtocol::UDP,
            vec![0; 8],
        )
        .to_bytes();
        assert!(Ipv4Packet::from_bytes(&bytes[..24]).is_none());
    }

    #[test]
    fn test_ipv6_header_fields() {
        let src: Ipv6Addr = "fe80::1".parse().unwrap();
        let dst: Ipv6Addr = "ff02::1".parse().unwrap();
        let bytes = Ipv6Packet::new(src, dst, IpProtocol::ICMPv6, vec![1, 2, 3])
            .with_hop_limit(255)
            .to_bytes();

        assert_eq!(bytes[0] >> 4, 6);
        assert_eq!(u16::from_be_bytes([bytes[4], bytes[5]]), 3);
        assert_eq!(bytes[6], 58);
        assert_eq!(bytes[7], 255);
        assert_eq!(&bytes[8..24], &src.octets());
        assert_eq!(&bytes[24..40], &dst.octets());
    }

    #[test]
    fn test_ipv6_parse_trims_padding() {
        let src: Ipv6Addr = "2001:db8::1".parse().unwrap();
        let dst: Ipv6Addr = "2001:db8::2".parse().unwrap();
        let mut bytes = Ipv6Packet::new(src, dst, IpProtocol::UDP, vec![9; 4]).to_bytes();
        bytes.extend_from_slice(&[0u8; 6]);

        let parsed = Ipv6Packet::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.source, src);
        assert_eq!(parsed.destination, dst);
        assert_eq!(parsed.next_header, IpProtocol::UDP);
        assert_eq!(parsed.payload, vec![9; 4]);
    }
}
