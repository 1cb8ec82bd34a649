use crate::targets::Target;
use std::net::Ipv6Addr;

pub const DEFAULT_NEIGHBOUR: Ipv6Addr = Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1);
pub const DEFAULT_PREFIX: Ipv6Addr = Ipv6Addr::new(0xd00d, 0, 0, 0, 0, 0, 0, 0);
pub const DEFAULT_PREFIX_LENGTH: u8 = 64;

/// NDP spoofing parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdpSpoofConfig {
    /// Victims; MACs and aliases are mapped to their IPv6 every tick
    pub targets: Vec<Target>,
    /// Address to impersonate, `None` disables neighbor advertisements
    pub neighbour: Option<Ipv6Addr>,
    /// Advertised prefix, `None` disables router advertisements
    pub prefix: Option<Ipv6Addr>,
    pub prefix_length: u8,
    /// Do not enable forwarding, so spoofed traffic is dropped
    pub ban: bool,
}

impl Default for NdpSpoofConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            neighbour: Some(DEFAULT_NEIGHBOUR),
            prefix: Some(DEFAULT_PREFIX),
            prefix_length: DEFAULT_PREFIX_LENGTH,
            ban: false,
        }
    }
}

impl NdpSpoofConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_targets(mut self, targets: Vec<Target>) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_neighbour(mut self, neighbour: Option<Ipv6Addr>) -> Self {
        self.neighbour = neighbour;
        self
    }

    pub fn with_prefix(mut self, prefix: Option<Ipv6Addr>, length: u8) -> Self {
        self.prefix = prefix;
        self.prefix_length = length;
        self
    }

    pub fn with_ban(mut self, ban: bool) -> Self {
        self.ban = ban;
        self
    }
}
