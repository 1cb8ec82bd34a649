//! Spoofing engines for netspoof
//!
//! Each engine owns a single 1 Hz (or capture-driven) loop and shares its
//! collaborators through a [`SpoofContext`]:
//!
//! - [`ArpSpoofEngine`]: ARP cache poisoning, half or full duplex
//! - [`DnsSpoofEngine`]: forged answers to captured DNS queries
//! - [`NdpSpoofEngine`]: rogue IPv6 router and neighbor advertisements
//!
//! Engines are driven by name through the [`EngineRegistry`].

pub mod arp;
pub mod context;
pub mod dns;
pub mod ndp;
pub mod registry;
pub mod targets;

#[cfg(test)]
mod testing;

pub use arp::{ArpSpoofConfig, ArpSpoofEngine};
pub use context::SpoofContext;
pub use dns::{DnsSpoofConfig, DnsSpoofEngine, HostTable};
pub use ndp::{NdpSpoofConfig, NdpSpoofEngine};
pub use registry::{EngineInfo, EngineRegistry};
pub use targets::{parse_targets, Target};
