//! Ethernet II frame construction and parsing

use bytes::{BufMut, BytesMut};
use netspoof_core::{ethertypes, MacAddr};
use std::fmt;

/// EtherType values the engines produce or consume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtherType {
    /// IPv4 (0x0800)
    IPv4,
    /// ARP (0x0806)
    ARP,
    /// IPv6 (0x86DD)
    IPv6,
    /// Anything else
    Custom(u16),
}

impl EtherType {
    pub fn to_u16(self) -> u16 {
        match self {
            EtherType::IPv4 => ethertypes::IPV4,
            EtherType::ARP => ethertypes::ARP,
            EtherType::IPv6 => ethertypes::IPV6,
            EtherType::Custom(val) => val,
        }
    }

    pub fn from_u16(value: u16) -> Self {
        match value {
            ethertypes::IPV4 => EtherType::IPv4,
            ethertypes::ARP => EtherType::ARP,
            ethertypes::IPV6 => EtherType::IPv6,
            val => EtherType::Custom(val),
        }
    }
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EtherType::IPv4 => write!(f, "IPv4"),
            EtherType::ARP => write!(f, "ARP"),
            EtherType::IPv6 => write!(f, "IPv6"),
            EtherType::Custom(val) => write!(f, "0x{:04X}", val),
        }
    }
}

/// Ethernet II frame
#[derive(Debug, Clone)]
pub struct EthernetFrame {
    /// Destination MAC address
    pub destination: MacAddr,
    /// Source MAC address
    pub source: MacAddr,
    pub ethertype: EtherType,
    /// Payload data (may include trailing padding when parsed)
    pub payload: Vec<u8>,
}

impl EthernetFrame {
    /// Minimum Ethernet frame size (without FCS)
    pub const MIN_FRAME_SIZE: usize = 60;

    /// Ethernet header size (dst + src + type)
    pub const HEADER_SIZE: usize = 14;

    pub fn new(
        destination: MacAddr,
        source: MacAddr,
        ethertype: EtherType,
        payload: Vec<u8>,
    ) -> Self {
        EthernetFrame {
            destination,
            source,
            ethertype,
            payload,
        }
    }

    /// Convert the frame to bytes, zero-padded to the minimum frame size
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = BytesMut::with_capacity(Self::HEADER_SIZE + self.payload.len());

        buffer.put_slice(self.destination.as_bytes());
        buffer.put_slice(self.source.as_bytes());
        buffer.put_u16(self.ethertype.to_u16());
        buffer.put_slice(&self.payload);

        let mut result = buffer.to_vec();
        if result.len() < Self::MIN_FRAME_SIZE {
            result.resize(Self::MIN_FRAME_SIZE, 0);
        }
        result
    }

    /// Parse an Ethernet II frame from bytes
    ///
    /// 802.3 length-encoded frames are rejected; nothing the engines care
    /// about travels in them.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::HEADER_SIZE {
            return None;
        }

        let mut destination = [0u8; 6];
        destination.copy_from_slice(&data[0..6]);
        let mut source = [0u8; 6];
        source.copy_from_slice(&data[6..12]);

        let ethertype = u16::from_be_bytes([data[12], data[13]]);
        if ethertype <= 1500 {
            return None;
        }

        Some(EthernetFrame {
            destination: MacAddr(destination),
            source: MacAddr(source),
            ethertype: EtherType::from_u16(ethertype),
            payload: data[Self::HEADER_SIZE..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ethertype_conversion() {
        assert_eq!(EtherType::IPv6.to_u16(), 0x86DD);
        assert_eq!(EtherType::from_u16(0x0806), EtherType::ARP);
        assert_eq!(EtherType::from_u16(0x8100), EtherType::Custom(0x8100));
    }

    #[test]
    fn test_ethernet_frame_padding() {
        let src = MacAddr([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        let dst = MacAddr([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        let frame = EthernetFrame::new(dst, src, EtherType::IPv4, vec![0x01, 0x02]);
        let bytes = frame.to_bytes();

        assert_eq!(bytes.len(), EthernetFrame::MIN_FRAME_SIZE);
        assert_eq!(&bytes[0..6], dst.as_bytes());
        assert_eq!(&bytes[6..12], src.as_bytes());
        assert_eq!(u16::from_be_bytes([bytes[12], bytes[13]]), 0x0800);
        assert!(bytes[16..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_ethernet_frame_from_bytes() {
        let data = vec![
            0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, // dst
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, // src
            0x86, 0xDD, // IPv6
            0x01, 0x02, 0x03, 0x04, // payload
        ];

        let frame = EthernetFrame::from_bytes(&data).unwrap();
        assert_eq!(frame.destination.0, [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert_eq!(frame.source.0, [0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        assert_eq!(frame.ethertype, EtherType::IPv6);
        assert_eq!(frame.payload, vec![0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_ethernet_rejects_llc_and_short() {
        let mut data = vec![0u8; 20];
        data[12] = 0x00;
        data[13] = 0x20;
        assert!(EthernetFrame::from_bytes(&data).is_none());
        assert!(EthernetFrame::from_bytes(&data[..10]).is_none());
    }
}
