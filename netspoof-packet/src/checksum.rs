//! Checksum calculations for network packets
//!
//! Implements the Internet Checksum (RFC 1071) and the transport checksums
//! that cover an IPv4 (RFC 768) or IPv6 (RFC 8200 §8.1) pseudo-header.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Calculates the Internet Checksum as defined in RFC 1071.
///
/// # Examples
///
/// ```
/// use netspoof_packet::checksum::internet_checksum;
///
/// let data = vec![0x45, 0x00, 0x00, 0x3c];
/// let checksum = internet_checksum(&data);
/// ```
pub fn internet_checksum(data: &[u8]) -> u16 {
    finish(accumulate(0, data))
}

fn accumulate(mut sum: u32, data: &[u8]) -> u32 {
    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        sum += u16::from_be_bytes([chunk[0], chunk[1]]) as u32;
    }

    // Odd trailing byte is padded with zero
    if let Some(&byte) = chunks.remainder().first() {
        sum += (byte as u32) << 8;
    }

    sum
}

fn finish(mut sum: u32) -> u16 {
    while (sum >> 16) != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !sum as u16
}

/// Network-layer addresses a transport checksum is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoHeader {
    V4 { source: Ipv4Addr, destination: Ipv4Addr },
    V6 { source: Ipv6Addr, destination: Ipv6Addr },
}

impl PseudoHeader {
    /// Build a pseudo-header from two addresses of the same family
    pub fn new(source: IpAddr, destination: IpAddr) -> Option<Self> {
        match (source, destination) {
            (IpAddr::V4(source), IpAddr::V4(destination)) => {
                Some(PseudoHeader::V4 { source, destination })
            }
            (IpAddr::V6(source), IpAddr::V6(destination)) => {
                Some(PseudoHeader::V6 { source, destination })
            }
            _ => None,
        }
    }

    /// Checksum of `segment` (header with zeroed checksum field, plus payload)
    ///
    /// The IPv4 form carries a 16-bit length, the IPv6 form a 32-bit
    /// upper-layer length and the next-header value in the last octet.
    pub fn checksum(&self, protocol: u8, segment: &[u8]) -> u16 {
        let mut sum = match self {
            PseudoHeader::V4 {
                source,
                destination,
            } => {
                let mut sum = accumulate(0, &source.octets());
                sum = accumulate(sum, &destination.octets());
                sum += protocol as u32;
                sum + segment.len() as u32
            }
            PseudoHeader::V6 {
                source,
                destination,
            } => {
                let mut sum = accumulate(0, &source.octets());
                sum = accumulate(sum, &destination.octets());
                sum = accumulate(sum, &(segment.len() as u32).to_be_bytes());
                sum + protocol as u32
            }
        };
        sum = accumulate(sum, segment);
        finish(sum)
    }
}

/// Validates an Internet checksum computed over data that includes it.
pub fn validate_checksum(data: &[u8]) -> bool {
    let result = internet_checksum(data);
    result == 0 || result == 0xFFFF
}
