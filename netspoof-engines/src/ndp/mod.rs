//! IPv6 neighbor discovery spoofing
//!
//! Every second a Router Advertisement for a rogue prefix is sent to all
//! nodes, and each resolvable target receives a Neighbor Advertisement
//! claiming that the impersonated neighbour lives at this host's hardware
//! address. Nothing is restored on stop. In ban mode forwarding is not
//! turned on, so the redirected traffic is dropped unless something else
//! already enabled it.

mod config;
mod engine;

#[cfg(test)]
mod tests;

pub use config::{NdpSpoofConfig, DEFAULT_NEIGHBOUR, DEFAULT_PREFIX, DEFAULT_PREFIX_LENGTH};
pub use engine::{
    neighbor_advertisement_frame, router_advertisement_frame, NdpSpoofEngine,
    PREFIX_PREFERRED_LIFETIME, PREFIX_VALID_LIFETIME,
};
