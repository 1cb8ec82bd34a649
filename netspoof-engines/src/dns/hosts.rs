//! Domain patterns and the hosts table they are resolved against

use netspoof_core::{Error, Result};
use regex::Regex;
use std::fmt;
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use tracing::debug;

/// Lowercase, without the trailing root dot
fn normalize(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

#[derive(Debug, Clone)]
enum Pattern {
    Exact(String),
    /// `*.example.com`: the domain itself and every name below it
    Subdomains(String),
    Glob(Regex),
}

/// One domain pattern mapped to the address it should resolve to
#[derive(Debug, Clone)]
pub struct HostEntry {
    host: String,
    pattern: Pattern,
    pub address: IpAddr,
}

impl HostEntry {
    pub fn new(host: &str, address: IpAddr) -> Result<Self> {
        let host = normalize(host);
        if host.is_empty() {
            return Err(Error::invalid_parameter("domain", "empty domain pattern"));
        }

        let pattern = match host.strip_prefix("*.") {
            Some(suffix) if !suffix.contains('*') && !suffix.contains('?') => {
                Pattern::Subdomains(suffix.to_string())
            }
            _ if host.contains('*') || host.contains('?') => {
                let body = regex::escape(&host).replace(r"\*", ".*").replace(r"\?", ".");
                let re = Regex::new(&format!("^{}$", body))
                    .map_err(|e| Error::invalid_parameter("domain", format!("{}: {}", host, e)))?;
                Pattern::Glob(re)
            }
            _ => Pattern::Exact(host.clone()),
        };

        Ok(Self {
            host,
            pattern,
            address,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn matches(&self, name: &str) -> bool {
        let name = normalize(name);
        match &self.pattern {
            Pattern::Exact(host) => *host == name,
            Pattern::Subdomains(suffix) => {
                name == *suffix
                    || (name.len() > suffix.len()
                        && name.ends_with(suffix.as_str())
                        && name.as_bytes()[name.len() - suffix.len() - 1] == b'.')
            }
            Pattern::Glob(re) => re.is_match(&name),
        }
    }
}

impl fmt::Display for HostEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.host, self.address)
    }
}

/// Ordered list of host entries; the first match wins
#[derive(Debug, Clone, Default)]
pub struct HostTable {
    entries: Vec<HostEntry>,
}

impl HostTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map every domain in `domains` to `address`
    pub fn from_domains<S: AsRef<str>>(domains: &[S], address: IpAddr) -> Result<Self> {
        let entries = domains
            .iter()
            .map(|d| d.as_ref().trim())
            .filter(|d| !d.is_empty())
            .map(|d| HostEntry::new(d, address))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    /// Parse hosts-file text: `<address> <domain> [domain...]` per line
    pub fn parse(text: &str) -> Result<Self> {
        let mut entries = Vec::new();

        for (number, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let mut fields = line.split_whitespace();
            let Some(addr) = fields.next() else {
                continue;
            };
            let address: IpAddr = addr.parse().map_err(|_| {
                Error::configuration(format!(
                    "hosts line {}: invalid address '{}' in '{}'",
                    number + 1,
                    addr,
                    raw.trim()
                ))
            })?;

            for domain in fields {
                entries.push(HostEntry::new(domain, address)?);
            }
        }

        Ok(Self { entries })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            Error::configuration(format!("cannot read hosts file {}: {}", path.display(), e))
        })?;
        let table = Self::parse(&text)?;
        debug!(path = %path.display(), entries = table.len(), "hosts file loaded");
        Ok(table)
    }

    pub fn extend(&mut self, other: HostTable) {
        self.entries.extend(other.entries);
    }

    /// Address for `name`, from the first matching entry
    pub fn resolve(&self, name: &str) -> Option<IpAddr> {
        self.entries
            .iter()
            .find(|entry| entry.matches(name))
            .map(|entry| entry.address)
    }

    pub fn entries(&self) -> &[HostEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
