//! Default gateway discovery

use netspoof_core::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::net::IpAddr;
use tokio::process::Command;
use tracing::debug;

static LINUX_ROUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^default\s+via\s+(?P<gw>[0-9a-fA-F.:]+)(?:\s+dev\s+(?P<iface>\S+))?")
        .expect("Invalid regex pattern")
});

static DARWIN_ROUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*gateway:\s*(?P<gw>[0-9a-fA-F.:]+)").expect("Invalid regex pattern")
});

/// Extract the default gateway from `ip route show default` output
///
/// When `interface` is given, routes through other devices are ignored.
pub fn parse_linux_route(text: &str, interface: Option<&str>) -> Option<IpAddr> {
    LINUX_ROUTE
        .captures_iter(text)
        .filter(|caps| match (interface, caps.name("iface")) {
            (Some(wanted), Some(dev)) => dev.as_str() == wanted,
            _ => true,
        })
        .find_map(|caps| caps["gw"].parse().ok())
}

/// Extract the default gateway from `route -n get default` output
pub fn parse_darwin_route(text: &str) -> Option<IpAddr> {
    DARWIN_ROUTE
        .captures(text)
        .and_then(|caps| caps["gw"].parse().ok())
}

/// Query the routing table for the default gateway of `interface`
pub async fn detect_gateway(interface: &str) -> Result<IpAddr> {
    let (program, args): (&str, &[&str]) = if cfg!(target_os = "linux") {
        ("ip", &["route", "show", "default"])
    } else {
        ("route", &["-n", "get", "default"])
    };

    let output = Command::new(program).args(args).output().await?;
    if !output.status.success() {
        return Err(Error::ExecutionFailed(format!(
            "{} {}: {}",
            program,
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let text = String::from_utf8_lossy(&output.stdout);
    let gateway = if cfg!(target_os = "linux") {
        parse_linux_route(&text, Some(interface))
    } else {
        parse_darwin_route(&text)
    };

    let gateway = gateway.ok_or_else(|| Error::not_found("default gateway"))?;
    debug!(interface, gateway = %gateway, "gateway detected");
    Ok(gateway)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_linux_route() {
        let text = "default via 192.168.1.1 dev wlan0 proto dhcp metric 600\n\
                    default via 10.0.0.1 dev eth0 proto static metric 100\n";

        assert_eq!(
            parse_linux_route(text, Some("eth0")),
            Some("10.0.0.1".parse().unwrap())
        );
        assert_eq!(
            parse_linux_route(text, None),
            Some("192.168.1.1".parse().unwrap())
        );
        assert_eq!(parse_linux_route(text, Some("tun0")), None);
    }

    #[test]
    fn test_parse_darwin_route() {
        let text = "   route to: default\n\
                    destination: default\n\
                           mask: default\n\
                        gateway: 192.168.0.254\n\
                      interface: en0\n";

        assert_eq!(
            parse_darwin_route(text),
            Some("192.168.0.254".parse().unwrap())
        );
        assert_eq!(parse_darwin_route("route: writing to routing socket"), None);
    }
}
