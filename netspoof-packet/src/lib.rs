//! Packet synthesis for netspoof
//!
//! Type-safe construction and parsing of the frames the spoofing engines
//! emit and inspect:
//!
//! - **Ethernet II** frames
//! - **ARP** requests and replies
//! - **IPv4** and **IPv6** packets
//! - **UDP** datagrams with IPv4 or IPv6 pseudo-header checksums
//! - **ICMPv6** Router and Neighbor Advertisements
//!
//! [`PacketBuilder`] stacks these into a single frame:
//!
//! ```rust
//! use std::net::Ipv6Addr;
//! use netspoof_core::MacAddr;
//! use netspoof_packet::icmpv6::{NeighborAdvertisement, ND_HOP_LIMIT};
//! use netspoof_packet::PacketBuilder;
//!
//! let me = MacAddr([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
//! let victim = MacAddr([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
//! let router: Ipv6Addr = "fe80::1".parse().unwrap();
//!
//! let frame = PacketBuilder::new()
//!     .ethernet(me, victim)
//!     .ipv6(router, "fe80::42".parse().unwrap())
//!     .hop_limit(ND_HOP_LIMIT)
//!     .icmpv6(NeighborAdvertisement::new(router, false).with_target_ll(me).into_icmpv6())
//!     .build()
//!     .unwrap();
//! ```

pub mod arp;
pub mod builder;
pub mod checksum;
pub mod ethernet;
pub mod icmpv6;
pub mod ip;
pub mod udp;

pub use arp::{ArpOpcode, ArpPacket};
pub use builder::PacketBuilder;
pub use checksum::{internet_checksum, PseudoHeader};
pub use ethernet::{EtherType, EthernetFrame};
pub use icmpv6::{Icmpv6Message, NeighborAdvertisement, RouterAdvertisement};
pub use ip::{IpProtocol, Ipv4Packet, Ipv6Packet};
pub use udp::{UdpDatagram, UdpPort};
