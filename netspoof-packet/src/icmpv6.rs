//! ICMPv6 and Neighbor Discovery messages (RFC 4443, RFC 4861)

use crate::checksum::PseudoHeader;
use crate::ip::IpProtocol;
use bytes::{BufMut, BytesMut};
use netspoof_core::MacAddr;
use std::net::Ipv6Addr;

/// All-nodes multicast address (ff02::1)
pub const ALL_NODES: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1);

/// Hop limit every ND message must carry
pub const ND_HOP_LIMIT: u8 = 255;

/// ND message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NdType {
    RouterAdvertisement = 134,
    NeighborAdvertisement = 136,
}

/// ND option types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NdOptionType {
    SourceLinkLayerAddress = 1,
    TargetLinkLayerAddress = 2,
    PrefixInformation = 3,
}

impl NdOptionType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::SourceLinkLayerAddress),
            2 => Some(Self::TargetLinkLayerAddress),
            3 => Some(Self::PrefixInformation),
            _ => None,
        }
    }
}

/// ND option (type, length in 8-octet units, data)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdOption {
    pub option_type: NdOptionType,
    pub data: Vec<u8>,
}

impl NdOption {
    pub fn source_ll_addr(mac: MacAddr) -> Self {
        Self {
            option_type: NdOptionType::SourceLinkLayerAddress,
            data: mac.as_bytes().to_vec(),
        }
    }

    pub fn target_ll_addr(mac: MacAddr) -> Self {
        Self {
            option_type: NdOptionType::TargetLinkLayerAddress,
            data: mac.as_bytes().to_vec(),
        }
    }

    /// Prefix Information option with the on-link and autonomous flags set
    pub fn prefix_information(
        prefix: Ipv6Addr,
        prefix_len: u8,
        valid_lifetime: u32,
        preferred_lifetime: u32,
    ) -> Self {
        let mut data = BytesMut::with_capacity(30);
        data.put_u8(prefix_len);
        data.put_u8(0x80 | 0x40);
        data.put_u32(valid_lifetime);
        data.put_u32(preferred_lifetime);
        data.put_u32(0);
        data.put_slice(&prefix.octets());

        Self {
            option_type: NdOptionType::PrefixInformation,
            data: data.to_vec(),
        }
    }

    /// Encode option, padded to an 8-octet boundary
    pub fn to_bytes(&self) -> Vec<u8> {
        let total_len = 2 + self.data.len();
        let units = total_len.div_ceil(8);

        let mut bytes = Vec::with_capacity(units * 8);
        bytes.push(self.option_type as u8);
        bytes.push(units as u8);
        bytes.extend_from_slice(&self.data);
        bytes.resize(units * 8, 0);
        bytes
    }

    /// Parse one option, returning it with the number of bytes consumed
    pub fn from_bytes(data: &[u8]) -> Option<(Self, usize)> {
        if data.len() < 2 || data[1] == 0 {
            return None;
        }

        let total_bytes = data[1] as usize * 8;
        if data.len() < total_bytes {
            return None;
        }

        let option_type = NdOptionType::from_u8(data[0])?;
        Some((
            Self {
                option_type,
                data: data[2..total_bytes].to_vec(),
            },
            total_bytes,
        ))
    }
}

/// Router Advertisement
#[derive(Debug, Clone)]
pub struct RouterAdvertisement {
    pub cur_hop_limit: u8,
    pub managed_flag: bool,
    pub other_config_flag: bool,
    pub router_lifetime: u16,
    pub reachable_time: u32,
    pub retrans_timer: u32,
    pub options: Vec<NdOption>,
}

impl Default for RouterAdvertisement {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterAdvertisement {
    pub fn new() -> Self {
        Self {
            cur_hop_limit: 64,
            managed_flag: false,
            other_config_flag: false,
            router_lifetime: 1800,
            reachable_time: 0,
            retrans_timer: 0,
            options: vec![],
        }
    }

    pub fn with_prefix(
        mut self,
        prefix: Ipv6Addr,
        prefix_len: u8,
        valid_lifetime: u32,
        preferred_lifetime: u32,
    ) -> Self {
        self.options.push(NdOption::prefix_information(
            prefix,
            prefix_len,
            valid_lifetime,
            preferred_lifetime,
        ));
        self
    }

    pub fn with_source_ll(mut self, mac: MacAddr) -> Self {
        self.options.push(NdOption::source_ll_addr(mac));
        self
    }

    /// Message body following the 4-byte ICMPv6 header
    pub fn body(&self) -> Vec<u8> {
        let mut bytes = BytesMut::with_capacity(12);
        bytes.put_u8(self.cur_hop_limit);

        let mut flags = 0u8;
        if self.managed_flag {
            flags |= 0x80;
        }
        if self.other_config_flag {
            flags |= 0x40;
        }
        bytes.put_u8(flags);
        bytes.put_u16(self.router_lifetime);
        bytes.put_u32(self.reachable_time);
        bytes.put_u32(self.retrans_timer);

        for option in &self.options {
            bytes.put_slice(&option.to_bytes());
        }
        bytes.to_vec()
    }

    pub fn into_icmpv6(self) -> Icmpv6Message {
        Icmpv6Message::new(NdType::RouterAdvertisement as u8, 0, self.body())
    }
}

/// Neighbor Advertisement
#[derive(Debug, Clone)]
pub struct NeighborAdvertisement {
    pub router_flag: bool,
    pub solicited_flag: bool,
    pub override_flag: bool,
    pub target_address: Ipv6Addr,
    pub options: Vec<NdOption>,
}

impl NeighborAdvertisement {
    /// Solicited, overriding advertisement for `target`
    pub fn new(target: Ipv6Addr, is_router: bool) -> Self {
        Self {
            router_flag: is_router,
            solicited_flag: true,
            override_flag: true,
            target_address: target,
            options: vec![],
        }
    }

    pub fn with_target_ll(mut self, mac: MacAddr) -> Self {
        self.options.push(NdOption::target_ll_addr(mac));
        self
    }

    pub fn body(&self) -> Vec<u8> {
        let mut bytes = BytesMut::with_capacity(20);

        let mut flags = 0u32;
        if self.router_flag {
            flags |= 0x8000_0000;
        }
        if self.solicited_flag {
            flags |= 0x4000_0000;
        }
        if self.override_flag {
            flags |= 0x2000_0000;
        }
        bytes.put_u32(flags);
        bytes.put_slice(&self.target_address.octets());

        for option in &self.options {
            bytes.put_slice(&option.to_bytes());
        }
        bytes.to_vec()
    }

    pub fn into_icmpv6(self) -> Icmpv6Message {
        Icmpv6Message::new(NdType::NeighborAdvertisement as u8, 0, self.body())
    }
}

/// Generic ICMPv6 message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Icmpv6Message {
    pub icmp_type: u8,
    pub code: u8,
    pub checksum: u16,
    pub body: Vec<u8>,
}

impl Icmpv6Message {
    pub const HEADER_SIZE: usize = 4;

    pub fn new(icmp_type: u8, code: u8, body: Vec<u8>) -> Self {
        Self {
            icmp_type,
            code,
            checksum: 0,
            body,
        }
    }

    fn encode(&self, checksum: u16) -> Vec<u8> {
        let mut bytes = BytesMut::with_capacity(Self::HEADER_SIZE + self.body.len());
        bytes.put_u8(self.icmp_type);
        bytes.put_u8(self.code);
        bytes.put_u16(checksum);
        bytes.put_slice(&self.body);
        bytes.to_vec()
    }

    /// Serialize with the checksum bound to the IPv6 pseudo-header
    pub fn to_bytes(&self, pseudo: &PseudoHeader) -> Vec<u8> {
        let checksum = pseudo.checksum(IpProtocol::ICMPv6.to_u8(), &self.encode(0));
        self.encode(checksum)
    }

    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::HEADER_SIZE {
            return None;
        }
        Some(Self {
            icmp_type: data[0],
            code: data[1],
            checksum: u16::from_be_bytes([data[2], data[3]]),
            body: data[Self::HEADER_SIZE..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAC: MacAddr = MacAddr([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);

    #[test]
    fn test_router_advertisement_body() {
        let body = RouterAdvertisement::new()
            .with_prefix("d00d::".parse().unwrap(), 64, 86400, 14400)
            .with_source_ll(MAC)
            .body();

        assert_eq!(body[0], 64);
        assert_eq!(u16::from_be_bytes([body[2], body[3]]), 1800);
        // 12 fixed + 32 prefix option + 8 source link-layer option
        assert_eq!(body.len(), 52);

        let (prefix, used) = NdOption::from_bytes(&body[12..]).unwrap();
        assert_eq!(used, 32);
        assert_eq!(prefix.option_type, NdOptionType::PrefixInformation);
        assert_eq!(prefix.data[0], 64);
        assert_eq!(prefix.data[1], 0xC0);
        assert_eq!(&prefix.data[14..30], &"d00d::".parse::<Ipv6Addr>().unwrap().octets());

        let (sll, used) = NdOption::from_bytes(&body[44..]).unwrap();
        assert_eq!(used, 8);
        assert_eq!(sll.option_type, NdOptionType::SourceLinkLayerAddress);
        assert_eq!(&sll.data[..6], MAC.as_bytes());
    }

    #[test]
    fn test_neighbor_advertisement_body() {
        let target: Ipv6Addr = "fe80::1".parse().unwrap();
        let body = NeighborAdvertisement::new(target, false)
            .with_target_ll(MAC)
            .body();

        assert_eq!(body[0], 0x60);
        assert_eq!(&body[4..20], &target.octets());
        assert_eq!(body[20], NdOptionType::TargetLinkLayerAddress as u8);
        assert_eq!(body[21], 1);
        assert_eq!(&body[22..28], MAC.as_bytes());
    }

    #[test]
    fn test_icmpv6_checksum_verifies() {
        let pseudo = PseudoHeader::V6 {
            source: "fe80::1".parse().unwrap(),
            destination: ALL_NODES,
        };
        let bytes = RouterAdvertisement::new()
            .with_source_ll(MAC)
            .into_icmpv6()
            .to_bytes(&pseudo);

        assert_eq!(bytes[0], 134);
        assert_ne!(u16::from_be_bytes([bytes[2], bytes[3]]), 0);
        // Summing over the pseudo-header and the filled-in message yields zero
        assert_eq!(pseudo.checksum(58, &bytes), 0);
    }

    #[test]
    fn test_nd_option_rejects_zero_length() {
        assert!(NdOption::from_bytes(&[1, 0, 0, 0, 0, 0, 0, 0]).is_none());
    }
}
