//! Long-lived LAN endpoint registry
//!
//! Endpoints are keyed by hardware address. A removal request only counts an
//! absence; the endpoint is purged once it has been absent for `grace`
//! consecutive cycles.

use crate::neighbors::IpVersions;
use dashmap::DashMap;
use netspoof_core::{Error, Interface, MacAddr, Result};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::SystemTime;
use tracing::{debug, info};

/// Default number of consecutive absences before an endpoint is purged
pub const DEFAULT_GRACE: u32 = 10;

/// A host seen on the local segment
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub mac: MacAddr,
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
    pub alias: Option<String>,
    pub first_seen: SystemTime,
    pub last_seen: SystemTime,
    /// Consecutive cycles this endpoint was missing from the neighbor table
    pub absences: u32,
}

impl Endpoint {
    fn new(mac: MacAddr, addrs: IpVersions) -> Self {
        let now = SystemTime::now();
        Self {
            mac,
            ipv4: addrs.ipv4,
            ipv6: addrs.ipv6,
            alias: None,
            first_seen: now,
            last_seen: now,
            absences: 0,
        }
    }

    pub fn addresses(&self) -> IpVersions {
        IpVersions {
            ipv4: self.ipv4,
            ipv6: self.ipv6,
        }
    }

    /// Alias if one is set, otherwise the hardware address
    pub fn label(&self) -> String {
        self.alias.clone().unwrap_or_else(|| self.mac.to_string())
    }
}

/// Registry contract used by the tracker and the engines
pub trait EndpointRegistry: Send + Sync {
    /// Insert or refresh an endpoint; returns `true` when it was not known
    fn add(&self, mac: MacAddr, addrs: IpVersions) -> Result<bool>;

    /// Mark an endpoint as present without changing its addresses
    fn touch(&self, mac: &MacAddr);

    /// Count one absence; returns `true` when the endpoint was purged
    fn remove(&self, mac: &MacAddr) -> bool;

    fn get(&self, mac: &MacAddr) -> Option<Endpoint>;

    fn endpoints(&self) -> Vec<Endpoint>;

    /// Endpoint owning `ip`, if any
    fn find_by_ip(&self, ip: IpAddr) -> Option<Endpoint> {
        self.endpoints()
            .into_iter()
            .find(|e| e.addresses().contains(ip))
    }

    fn resolve_alias(&self, alias: &str) -> Option<MacAddr>;

    /// Addresses that must never be targeted (own addresses, gateway)
    fn should_skip(&self, ip: IpAddr) -> bool;

    fn is_empty(&self) -> bool {
        self.endpoints().is_empty()
    }
}

/// In-memory registry backed by a concurrent map
pub struct LanRegistry {
    endpoints: DashMap<MacAddr, Endpoint>,
    aliases: DashMap<MacAddr, String>,
    skip: RwLock<HashSet<IpAddr>>,
    grace: u32,
}

impl LanRegistry {
    pub fn new() -> Self {
        Self::with_grace(DEFAULT_GRACE)
    }

    pub fn with_grace(grace: u32) -> Self {
        Self {
            endpoints: DashMap::new(),
            aliases: DashMap::new(),
            skip: RwLock::new(HashSet::new()),
            grace: grace.max(1),
        }
    }

    /// Registry that ignores the interface's own addresses and the gateway
    pub fn for_interface(interface: &Interface, gateway: Option<IpAddr>) -> Self {
        let registry = Self::new();
        interface
            .ipv4
            .map(IpAddr::V4)
            .into_iter()
            .chain(interface.ipv6.map(IpAddr::V6))
            .chain(gateway)
            .for_each(|ip| registry.skip(ip));
        registry
    }

    pub fn grace(&self) -> u32 {
        self.grace
    }

    /// Never target `ip`
    pub fn skip(&self, ip: IpAddr) {
        self.skip.write().insert(ip);
    }

    /// Name a hardware address; the alias survives purges
    pub fn set_alias(&self, mac: MacAddr, alias: impl Into<String>) {
        let alias = alias.into();
        if let Some(mut endpoint) = self.endpoints.get_mut(&mac) {
            endpoint.alias = Some(alias.clone());
        }
        self.aliases.insert(mac, alias);
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }
}

impl Default for LanRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointRegistry for LanRegistry {
    fn add(&self, mac: MacAddr, addrs: IpVersions) -> Result<bool> {
        if addrs.is_empty() {
            return Err(Error::invalid_parameter(
                "endpoint",
                format!("{} has neither IPv4 nor IPv6", mac),
            ));
        }

        if let Some(mut endpoint) = self.endpoints.get_mut(&mac) {
            endpoint.ipv4 = addrs.ipv4;
            endpoint.ipv6 = addrs.ipv6;
            endpoint.last_seen = SystemTime::now();
            endpoint.absences = 0;
            debug!(mac = %mac, "endpoint updated");
            return Ok(false);
        }

        let mut endpoint = Endpoint::new(mac, addrs);
        endpoint.alias = self.aliases.get(&mac).map(|a| a.value().clone());
        info!(
            mac = %mac,
            ipv4 = ?endpoint.ipv4,
            ipv6 = ?endpoint.ipv6,
            "new endpoint"
        );
        self.endpoints.insert(mac, endpoint);
        Ok(true)
    }

    fn touch(&self, mac: &MacAddr) {
        if let Some(mut endpoint) = self.endpoints.get_mut(mac) {
            endpoint.last_seen = SystemTime::now();
            endpoint.absences = 0;
        }
    }

    fn remove(&self, mac: &MacAddr) -> bool {
        let purge = match self.endpoints.get_mut(mac) {
            Some(mut endpoint) => {
                endpoint.absences += 1;
                endpoint.absences >= self.grace
            }
            None => return false,
        };

        if purge {
            self.endpoints.remove(mac);
            info!(mac = %mac, "endpoint lost");
        }
        purge
    }

    fn get(&self, mac: &MacAddr) -> Option<Endpoint> {
        self.endpoints.get(mac).map(|e| e.value().clone())
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        self.endpoints.iter().map(|e| e.value().clone()).collect()
    }

    fn resolve_alias(&self, alias: &str) -> Option<MacAddr> {
        self.aliases
            .iter()
            .find(|entry| entry.value().eq_ignore_ascii_case(alias))
            .map(|entry| *entry.key())
    }

    fn should_skip(&self, ip: IpAddr) -> bool {
        ip.is_unspecified() || ip.is_loopback() || self.skip.read().contains(&ip)
    }

    fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
