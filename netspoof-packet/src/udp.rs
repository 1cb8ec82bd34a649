//! UDP datagram construction and parsing

use crate::checksum::PseudoHeader;
use crate::ip::IpProtocol;
use bytes::{BufMut, BytesMut};

/// UDP port number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpPort(pub u16);

impl UdpPort {
    /// DNS (53)
    pub const DNS: UdpPort = UdpPort(53);

    pub fn new(port: u16) -> Self {
        UdpPort(port)
    }

    pub fn to_u16(self) -> u16 {
        self.0
    }
}

impl From<u16> for UdpPort {
    fn from(port: u16) -> Self {
        UdpPort(port)
    }
}

/// UDP datagram
#[derive(Debug, Clone)]
pub struct UdpDatagram {
    pub source_port: UdpPort,
    pub destination_port: UdpPort,
    /// Length (header + data)
    pub length: u16,
    pub checksum: u16,
    pub payload: Vec<u8>,
}

impl UdpDatagram {
    /// UDP header size in bytes
    pub const HEADER_SIZE: usize = 8;

    /// Create a new UDP datagram with an unset (zero) checksum
    pub fn new(source_port: UdpPort, destination_port: UdpPort, payload: Vec<u8>) -> Self {
        let length = (Self::HEADER_SIZE + payload.len()) as u16;

        UdpDatagram {
            source_port,
            destination_port,
            length,
            checksum: 0,
            payload,
        }
    }

    /// Calculate and set the checksum over the given pseudo-header
    ///
    /// A computed value of zero is transmitted as 0xFFFF: zero means "no
    /// checksum" for IPv4 and is forbidden outright for IPv6.
    pub fn calculate_checksum(&mut self, pseudo: &PseudoHeader) {
        self.checksum = 0;
        let checksum = pseudo.checksum(IpProtocol::UDP.to_u8(), &self.to_bytes());
        self.checksum = if checksum == 0 { 0xFFFF } else { checksum };
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = BytesMut::with_capacity(self.length as usize);

        buffer.put_u16(self.source_port.to_u16());
        buffer.put_u16(self.destination_port.to_u16());
        buffer.put_u16(self.length);
        buffer.put_u16(self.checksum);
        buffer.put_slice(&self.payload);

        buffer.to_vec()
    }

    /// Parse a UDP datagram, bounded by its length field
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::HEADER_SIZE {
            return None;
        }

        let length = u16::from_be_bytes([data[4], data[5]]);
        let end = length as usize;
        if end < Self::HEADER_SIZE || data.len() < end {
            return None;
        }

        Some(UdpDatagram {
            source_port: UdpPort::new(u16::from_be_bytes([data[0], data[1]])),
            destination_port: UdpPort::new(u16::from_be_bytes([data[2], data[3]])),
            length,
            checksum: u16::from_be_bytes([data[6], data[7]]),
            payload: data[Self::HEADER_SIZE..end].to_vec(),
        })
    }

    /// Validate the checksum; zero (absent) is accepted
    pub fn validate_checksum(&self, pseudo: &PseudoHeader) -> bool {
        if self.checksum == 0 {
            return true;
        }
        let calculated = pseudo.checksum(IpProtocol::UDP.to_u8(), &self.to_bytes());
        calculated == 0 || calculated == 0xFFFF
    }
}
