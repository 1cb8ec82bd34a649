//! CLI argument parsing
//!
//! Every spoofing subcommand maps its flags onto the typed engine config.

use clap::{Args, Parser, Subcommand};
use netspoof_core::{MacAddr, Result};
use netspoof_engines::dns::DEFAULT_TTL;
use netspoof_engines::ndp::{DEFAULT_NEIGHBOUR, DEFAULT_PREFIX, DEFAULT_PREFIX_LENGTH};
use netspoof_engines::{parse_targets, ArpSpoofConfig, DnsSpoofConfig, NdpSpoofConfig};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "netspoof")]
#[command(version, about = "LAN spoofing toolkit (ARP, DNS, NDP)", long_about = None)]
pub struct Cli {
    /// Network interface to use
    #[arg(short = 'I', long, global = true)]
    pub interface: Option<String>,

    /// Gateway address, detected from the routing table when omitted
    #[arg(long, global = true)]
    pub gateway: Option<IpAddr>,

    /// Verbose output (-v, -vv for increasing verbosity)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List available network interfaces
    Interfaces,

    /// Only track the hosts on the LAN
    Recon,

    /// Poison a victim's ARP cache
    Arp(ArpArgs),

    /// Answer DNS queries with spoofed addresses
    Dns(DnsArgs),

    /// Send rogue IPv6 router and neighbor advertisements
    Ndp(NdpArgs),
}

#[derive(Args, Debug)]
pub struct ArpArgs {
    /// Victim address (defaults to the gateway)
    #[arg(long)]
    pub victim: Option<Ipv4Addr>,

    /// Victim hardware address, looked up when omitted
    #[arg(long, value_name = "MAC", requires = "victim")]
    pub victim_mac: Option<MacAddr>,

    /// Address to impersonate (defaults to this host)
    #[arg(long)]
    pub spoof: Option<Ipv4Addr>,

    /// Hardware address to redirect the victim to (defaults to this host)
    #[arg(long, value_name = "MAC")]
    pub alias_mac: Option<MacAddr>,

    /// Also poison the impersonated host
    #[arg(long)]
    pub full_duplex: bool,

    /// Do not restore the caches on exit
    #[arg(long)]
    pub skip_restore: bool,
}

impl ArpArgs {
    pub fn config(&self) -> ArpSpoofConfig {
        ArpSpoofConfig {
            alias_mac: self.alias_mac,
            spoof_ip: self.spoof,
            victim_ip: self.victim,
            victim_mac: self.victim_mac,
            full_duplex: self.full_duplex,
            skip_restore: self.skip_restore,
        }
    }
}

#[derive(Args, Debug)]
pub struct DnsArgs {
    /// Comma separated domains; `*.` and glob patterns are accepted
    #[arg(short, long, value_delimiter = ',')]
    pub domains: Vec<String>,

    /// Address the domains resolve to (defaults to this host)
    #[arg(short, long)]
    pub address: Option<IpAddr>,

    /// Hosts file with `<address> <domain>...` lines
    #[arg(long, value_name = "FILE")]
    pub hosts: Option<PathBuf>,

    /// Answer queries addressed to any host
    #[arg(long)]
    pub all: bool,

    /// TTL of the forged answers
    #[arg(long, default_value_t = DEFAULT_TTL)]
    pub ttl: u32,
}

impl DnsArgs {
    pub fn config(&self) -> DnsSpoofConfig {
        DnsSpoofConfig {
            domains: self.domains.clone(),
            address: self.address,
            hosts_file: self.hosts.clone(),
            all: self.all,
            ttl: self.ttl,
        }
    }
}

#[derive(Args, Debug)]
pub struct NdpArgs {
    /// Comma separated IPv6 addresses, MACs or aliases
    #[arg(short, long)]
    pub targets: Option<String>,

    /// Address to impersonate
    #[arg(long, default_value_t = DEFAULT_NEIGHBOUR)]
    pub neighbour: Ipv6Addr,

    /// Disable neighbor advertisements
    #[arg(long)]
    pub no_neighbour: bool,

    /// Prefix to advertise
    #[arg(long, default_value_t = DEFAULT_PREFIX)]
    pub prefix: Ipv6Addr,

    /// Disable router advertisements
    #[arg(long)]
    pub no_prefix: bool,

    #[arg(long, default_value_t = DEFAULT_PREFIX_LENGTH)]
    pub prefix_length: u8,

    /// Keep forwarding disabled so the victims lose connectivity
    #[arg(long)]
    pub ban: bool,
}

impl NdpArgs {
    pub fn config(&self) -> Result<NdpSpoofConfig> {
        let targets = match &self.targets {
            Some(list) => parse_targets(list)?,
            None => Vec::new(),
        };

        Ok(NdpSpoofConfig {
            targets,
            neighbour: (!self.no_neighbour).then_some(self.neighbour),
            prefix: (!self.no_prefix).then_some(self.prefix),
            prefix_length: self.prefix_length,
            ban: self.ban,
        })
    }
}
