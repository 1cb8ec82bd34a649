//! Target lists as typed on the command line

use netspoof_core::{Error, MacAddr, Result};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// One entry of a target list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Ip(IpAddr),
    Mac(MacAddr),
    /// Registry alias, resolved to a hardware address when used
    Alias(String),
}

impl FromStr for Target {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::invalid_parameter("targets", "empty target"));
        }
        if let Ok(ip) = s.parse::<IpAddr>() {
            return Ok(Target::Ip(ip));
        }
        if let Ok(mac) = s.parse::<MacAddr>() {
            return Ok(Target::Mac(mac));
        }
        if s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Ok(Target::Alias(s.to_string()));
        }
        Err(Error::invalid_parameter(
            "targets",
            format!("'{}' is not an address, a MAC or an alias", s),
        ))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Ip(ip) => write!(f, "{}", ip),
            Target::Mac(mac) => write!(f, "{}", mac),
            Target::Alias(alias) => write!(f, "{}", alias),
        }
    }
}

/// Parse a comma separated list; blank items are ignored
pub fn parse_targets(list: &str) -> Result<Vec<Target>> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(Target::from_str)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_list() {
        let targets = parse_targets("fe80::2, 10.0.0.7,aa:bb:cc:dd:ee:ff , phone").unwrap();
        assert_eq!(
            targets,
            vec![
                Target::Ip("fe80::2".parse().unwrap()),
                Target::Ip("10.0.0.7".parse().unwrap()),
                Target::Mac(MacAddr([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff])),
                Target::Alias("phone".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_empty_list() {
        assert!(parse_targets("").unwrap().is_empty());
        assert!(parse_targets(" , ,").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_targets("fe80::2,not a host").unwrap_err();
        assert!(err.is_configuration());
    }
}
