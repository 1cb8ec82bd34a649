//! LAN reconnaissance for netspoof
//!
//! This crate keeps track of who is on the local segment:
//!
//! - [`NeighborTracker`] polls the kernel neighbor table and serves address
//!   resolution to the spoofing engines
//! - [`LanRegistry`] holds long-lived [`Endpoint`]s with a grace period
//!   before hosts are forgotten
//! - [`NetRecon`] ties both together as the `net.recon` engine
//!
//! It also hosts the small OS helpers the engines need: default gateway
//! discovery and the sysctl forwarding switch.

pub mod forwarding;
pub mod gateway;
pub mod neighbors;
pub mod registry;
pub mod tracker;

pub use forwarding::SysctlForwarding;
pub use gateway::detect_gateway;
pub use neighbors::{
    ArpSnapshot, CommandNeighborSource, IpVersions, NeighborParser, NeighborSource, TableFormat,
};
pub use registry::{Endpoint, EndpointRegistry, LanRegistry, DEFAULT_GRACE};
pub use tracker::{diff, DiffReport, NeighborTracker, NetRecon};
