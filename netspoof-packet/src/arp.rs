//! ARP packet structure and parsing (RFC 826, Ethernet/IPv4 only)

use bytes::{BufMut, BytesMut};
use netspoof_core::{Error, MacAddr, Result};
use std::net::Ipv4Addr;

/// Hardware type for Ethernet
pub const HTYPE_ETHERNET: u16 = 1;
/// Protocol type for IPv4
pub const PTYPE_IPV4: u16 = 0x0800;

/// ARP Operation Codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpOpcode {
    Request = 1,
    Reply = 2,
}

impl ArpOpcode {
    pub fn from_u16(val: u16) -> Option<Self> {
        match val {
            1 => Some(Self::Request),
            2 => Some(Self::Reply),
            _ => None,
        }
    }
}

/// ARP packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpPacket {
    pub operation: ArpOpcode,
    /// Sender hardware address
    pub sender_hw_addr: MacAddr,
    /// Sender protocol address
    pub sender_proto_addr: Ipv4Addr,
    /// Target hardware address
    pub target_hw_addr: MacAddr,
    /// Target protocol address
    pub target_proto_addr: Ipv4Addr,
}

impl ArpPacket {
    /// Wire size for Ethernet/IPv4
    pub const SIZE: usize = 28;

    /// Reply telling `target` that `sender_ip` is at `sender_mac`
    pub fn new_reply(
        sender_mac: MacAddr,
        sender_ip: Ipv4Addr,
        target_mac: MacAddr,
        target_ip: Ipv4Addr,
    ) -> Self {
        Self {
            operation: ArpOpcode::Reply,
            sender_hw_addr: sender_mac,
            sender_proto_addr: sender_ip,
            target_hw_addr: target_mac,
            target_proto_addr: target_ip,
        }
    }

    pub fn new_request(sender_mac: MacAddr, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        Self {
            operation: ArpOpcode::Request,
            sender_hw_addr: sender_mac,
            sender_proto_addr: sender_ip,
            target_hw_addr: MacAddr::zero(),
            target_proto_addr: target_ip,
        }
    }

    /// Parse an Ethernet/IPv4 ARP packet
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::parsing("ARP packet too short"));
        }

        let htype = u16::from_be_bytes([data[0], data[1]]);
        let ptype = u16::from_be_bytes([data[2], data[3]]);
        if htype != HTYPE_ETHERNET || ptype != PTYPE_IPV4 || data[4] != 6 || data[5] != 4 {
            return Err(Error::parsing("ARP packet is not Ethernet/IPv4"));
        }

        let operation = ArpOpcode::from_u16(u16::from_be_bytes([data[6], data[7]]))
            .ok_or_else(|| Error::parsing("Invalid ARP opcode"))?;

        let mut sender_hw_addr = [0u8; 6];
        sender_hw_addr.copy_from_slice(&data[8..14]);
        let sender_proto_addr = Ipv4Addr::new(data[14], data[15], data[16], data[17]);

        let mut target_hw_addr = [0u8; 6];
        target_hw_addr.copy_from_slice(&data[18..24]);
        let target_proto_addr = Ipv4Addr::new(data[24], data[25], data[26], data[27]);

        Ok(Self {
            operation,
            sender_hw_addr: MacAddr(sender_hw_addr),
            sender_proto_addr,
            target_hw_addr: MacAddr(target_hw_addr),
            target_proto_addr,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        buf.put_u16(HTYPE_ETHERNET);
        buf.put_u16(PTYPE_IPV4);
        buf.put_u8(6);
        buf.put_u8(4);
        buf.put_u16(self.operation as u16);
        buf.put_slice(self.sender_hw_addr.as_bytes());
        buf.put_slice(&self.sender_proto_addr.octets());
        buf.put_slice(self.target_hw_addr.as_bytes());
        buf.put_slice(&self.target_proto_addr.octets());
        buf.to_vec()
    }

    pub fn is_reply(&self) -> bool {
        self.operation == ArpOpcode::Reply
    }
}
