use netspoof_core::MacAddr;
use std::net::Ipv4Addr;

/// ARP spoofing parameters
///
/// Unset fields are resolved at start: the alias MAC and spoofed address
/// default to the interface's own, the victim defaults to the gateway and
/// its hardware address is looked up in the neighbor table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArpSpoofConfig {
    /// Hardware address the victim is pointed to
    pub alias_mac: Option<MacAddr>,
    /// Address being impersonated
    pub spoof_ip: Option<Ipv4Addr>,
    pub victim_ip: Option<Ipv4Addr>,
    pub victim_mac: Option<MacAddr>,
    /// Also poison the spoofed peer
    pub full_duplex: bool,
    /// Leave the victim's cache poisoned on stop
    pub skip_restore: bool,
}

impl ArpSpoofConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alias_mac(mut self, mac: MacAddr) -> Self {
        self.alias_mac = Some(mac);
        self
    }

    pub fn with_spoof_ip(mut self, ip: Ipv4Addr) -> Self {
        self.spoof_ip = Some(ip);
        self
    }

    pub fn with_victim(mut self, ip: Ipv4Addr, mac: Option<MacAddr>) -> Self {
        self.victim_ip = Some(ip);
        self.victim_mac = mac;
        self
    }

    pub fn with_full_duplex(mut self, enabled: bool) -> Self {
        self.full_duplex = enabled;
        self
    }

    pub fn with_skip_restore(mut self, skip: bool) -> Self {
        self.skip_restore = skip;
        self
    }
}
