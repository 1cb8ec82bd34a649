//! Common types used throughout netspoof

use std::fmt;
use std::str::FromStr;

/// MAC Address (6 bytes)
///
/// `Display` yields the canonical lowercase colon-separated form used as the
/// key of neighbor snapshots and the endpoint registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// Create a new MAC address
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Broadcast MAC address (ff:ff:ff:ff:ff:ff)
    pub const fn broadcast() -> Self {
        Self([0xff, 0xff, 0xff, 0xff, 0xff, 0xff])
    }

    /// Zero MAC address (00:00:00:00:00:00)
    pub const fn zero() -> Self {
        Self([0x00, 0x00, 0x00, 0x00, 0x00, 0x00])
    }

    /// IPv6 multicast MAC for the all-nodes group (33:33:00:00:00:01)
    pub const fn ipv6_all_nodes() -> Self {
        Self([0x33, 0x33, 0x00, 0x00, 0x00, 0x01])
    }

    /// Get bytes as slice
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert to array
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 6]
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddr {
    type Err = crate::Error;

    /// Accepts `:` or `-` separators and unpadded octets (`0:1b:2:...` as printed by BSD `arp`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split([':', '-']).collect();
        if parts.len() != 6 {
            return Err(crate::Error::invalid_parameter(
                "mac",
                format!("invalid MAC address format: {}", s),
            ));
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.is_empty() || part.len() > 2 {
                return Err(crate::Error::invalid_parameter(
                    "mac",
                    format!("invalid MAC address octet: {}", part),
                ));
            }
            bytes[i] = u8::from_str_radix(part, 16).map_err(|_| {
                crate::Error::invalid_parameter("mac", format!("invalid MAC address hex: {}", s))
            })?;
        }

        Ok(MacAddr(bytes))
    }
}

/// Ethertype constants
pub mod ethertypes {
    pub const IPV4: u16 = 0x0800;
    pub const ARP: u16 = 0x0806;
    pub const IPV6: u16 = 0x86DD;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_display_is_lowercase() {
        let mac = MacAddr::new([0xAA, 0xBB, 0xCC, 0x00, 0x01, 0x02]);
        assert_eq!(mac.to_string(), "aa:bb:cc:00:01:02");
    }

    #[test]
    fn test_mac_parse_variants() {
        let expected = MacAddr::new([0x00, 0x1b, 0x02, 0xab, 0x0c, 0xff]);
        assert_eq!("00:1b:02:ab:0c:ff".parse::<MacAddr>().unwrap(), expected);
        assert_eq!("0:1b:2:ab:c:ff".parse::<MacAddr>().unwrap(), expected);
        assert_eq!("00-1B-02-AB-0C-FF".parse::<MacAddr>().unwrap(), expected);
    }

    #[test]
    fn test_mac_parse_rejects_garbage() {
        assert!("00:11:22:33:44".parse::<MacAddr>().is_err());
        assert!("00:11:22:33:44:zz".parse::<MacAddr>().is_err());
        assert!("000:11:22:33:44:55".parse::<MacAddr>().is_err());
    }
}
