//! OS neighbor table sources and parsers
//!
//! The kernel neighbor table is read by running the platform command
//! (`ip -s neigh` on Linux, `arp -a -n` on macOS) and matching every line
//! against a per-platform pattern. Lines that do not match, that belong to
//! another interface, or that carry no hardware address are skipped.

use netspoof_core::{Error, MacAddr, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::process::Command;
use tracing::trace;

static LINUX_NEIGH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<ip>[0-9a-fA-F.:]+)\s+dev\s+(?P<iface>\S+)\s+lladdr\s+(?P<mac>[0-9a-fA-F]{1,2}(?::[0-9a-fA-F]{1,2}){5})\b",
    )
    .expect("Invalid regex pattern")
});

static DARWIN_ARP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\((?P<ip>[0-9a-fA-F.:]+)\)\s+at\s+(?P<mac>[0-9a-fA-F]{1,2}(?::[0-9a-fA-F]{1,2}){5})\s+on\s+(?P<iface>\S+)",
    )
    .expect("Invalid regex pattern")
});

/// Addresses known for one hardware address
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IpVersions {
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
}

impl IpVersions {
    pub fn v4(ip: Ipv4Addr) -> Self {
        Self {
            ipv4: Some(ip),
            ipv6: None,
        }
    }

    pub fn v6(ip: Ipv6Addr) -> Self {
        Self {
            ipv4: None,
            ipv6: Some(ip),
        }
    }

    /// Record an address, replacing the previous one of the same family
    pub fn set(&mut self, ip: IpAddr) {
        match ip {
            IpAddr::V4(v4) => self.ipv4 = Some(v4),
            IpAddr::V6(v6) => self.ipv6 = Some(v6),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ipv4.is_none() && self.ipv6.is_none()
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        match ip {
            IpAddr::V4(v4) => self.ipv4 == Some(v4),
            IpAddr::V6(v6) => self.ipv6 == Some(v6),
        }
    }

    /// True when both sides carry the same IPv4 or the same IPv6
    pub fn shares_any(&self, other: &IpVersions) -> bool {
        (self.ipv4.is_some() && self.ipv4 == other.ipv4)
            || (self.ipv6.is_some() && self.ipv6 == other.ipv6)
    }
}

/// One poll cycle of the neighbor table
///
/// Built once by the parser and never mutated afterwards. Every address seen
/// for a hardware address is indexed, so lookups also succeed for addresses
/// that were superseded in the per-family summary.
#[derive(Debug, Clone, Default)]
pub struct ArpSnapshot {
    entries: BTreeMap<MacAddr, IpVersions>,
    by_ip: HashMap<IpAddr, MacAddr>,
}

impl ArpSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mac: MacAddr, ip: IpAddr) {
        self.entries.entry(mac).or_default().set(ip);
        self.by_ip.insert(ip, mac);
    }

    pub fn get(&self, mac: &MacAddr) -> Option<&IpVersions> {
        self.entries.get(mac)
    }

    /// Hardware address currently mapped to `ip`
    pub fn mac_of(&self, ip: IpAddr) -> Option<MacAddr> {
        self.by_ip.get(&ip).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MacAddr, &IpVersions)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Producer of raw neighbor table text
pub trait NeighborSource: Send + Sync {
    fn fetch(&self) -> Result<String>;
}

impl<F> NeighborSource for F
where
    F: Fn() -> Result<String> + Send + Sync,
{
    fn fetch(&self) -> Result<String> {
        self()
    }
}

/// Runs the platform neighbor table command
#[derive(Debug, Clone)]
pub struct CommandNeighborSource {
    program: String,
    args: Vec<String>,
}

impl CommandNeighborSource {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// `ip -s neigh` on Linux, `arp -a -n` elsewhere
    pub fn platform() -> Self {
        if cfg!(target_os = "linux") {
            Self::new("ip", &["-s", "neigh"])
        } else {
            Self::new("arp", &["-a", "-n"])
        }
    }
}

impl Default for CommandNeighborSource {
    fn default() -> Self {
        Self::platform()
    }
}

impl NeighborSource for CommandNeighborSource {
    fn fetch(&self) -> Result<String> {
        let output = Command::new(&self.program).args(&self.args).output()?;

        if !output.status.success() {
            return Err(Error::ExecutionFailed(format!(
                "{} {}: {}",
                self.program,
                self.args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Output format of the neighbor table command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    /// `ip -s neigh`
    Linux,
    /// `arp -a -n`
    Darwin,
}

impl TableFormat {
    pub fn platform() -> Self {
        if cfg!(target_os = "linux") {
            TableFormat::Linux
        } else {
            TableFormat::Darwin
        }
    }

    fn pattern(&self) -> &'static Regex {
        match self {
            TableFormat::Linux => &LINUX_NEIGH,
            TableFormat::Darwin => &DARWIN_ARP,
        }
    }
}

/// Interface-filtered neighbor table parser
#[derive(Debug, Clone)]
pub struct NeighborParser {
    interface: String,
    format: TableFormat,
}

impl NeighborParser {
    pub fn new(interface: impl Into<String>, format: TableFormat) -> Self {
        Self {
            interface: interface.into(),
            format,
        }
    }

    pub fn for_platform(interface: impl Into<String>) -> Self {
        Self::new(interface, TableFormat::platform())
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn parse(&self, text: &str) -> ArpSnapshot {
        let pattern = self.format.pattern();
        let mut snapshot = ArpSnapshot::new();

        for line in text.lines() {
            let Some(caps) = pattern.captures(line) else {
                trace!(line, "skipping neighbor line");
                continue;
            };

            if &caps["iface"] != self.interface {
                continue;
            }

            let (Ok(ip), Ok(mac)) = (caps["ip"].parse::<IpAddr>(), caps["mac"].parse::<MacAddr>())
            else {
                trace!(line, "unparsable neighbor entry");
                continue;
            };

            if mac.is_zero() || mac == MacAddr::broadcast() {
                continue;
            }

            snapshot.insert(mac, ip);
        }

        snapshot
    }
}
