//! Kernel IP forwarding through sysctl

use netspoof_core::{Error, Forwarding, Result};
use std::fs;
use std::process::Command;
use tracing::{info, warn};

const LINUX_IPV4_FORWARD: &str = "/proc/sys/net/ipv4/ip_forward";
const LINUX_IPV6_FORWARD: &str = "/proc/sys/net/ipv6/conf/all/forwarding";
const DARWIN_IPV4_FORWARD: &str = "net.inet.ip.forwarding";
const DARWIN_IPV6_FORWARD: &str = "net.inet6.ip6.forwarding";

/// Host forwarding switch (`/proc/sys` on Linux, `sysctl` elsewhere)
#[derive(Debug, Default, Clone, Copy)]
pub struct SysctlForwarding;

impl SysctlForwarding {
    pub fn new() -> Self {
        Self
    }

    fn read_sysctl(key: &str) -> Option<String> {
        let output = Command::new("sysctl").args(["-n", key]).output().ok()?;
        output
            .status
            .success()
            .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn write_sysctl(key: &str, value: &str) -> Result<()> {
        let output = Command::new("sysctl")
            .args(["-w", &format!("{}={}", key, value)])
            .output()?;

        if !output.status.success() {
            return Err(Error::ExecutionFailed(format!(
                "sysctl -w {}={}: {}",
                key,
                value,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

impl Forwarding for SysctlForwarding {
    fn is_forwarding_enabled(&self) -> bool {
        if cfg!(target_os = "linux") {
            fs::read_to_string(LINUX_IPV4_FORWARD)
                .map(|v| v.trim() == "1")
                .unwrap_or(false)
        } else {
            Self::read_sysctl(DARWIN_IPV4_FORWARD).as_deref() == Some("1")
        }
    }

    fn set_forwarding(&self, enabled: bool) -> Result<()> {
        let value = if enabled { "1" } else { "0" };

        if cfg!(target_os = "linux") {
            fs::write(LINUX_IPV4_FORWARD, value)?;
            if let Err(e) = fs::write(LINUX_IPV6_FORWARD, value) {
                warn!(error = %e, "could not toggle IPv6 forwarding");
            }
        } else {
            Self::write_sysctl(DARWIN_IPV4_FORWARD, value)?;
            if let Err(e) = Self::write_sysctl(DARWIN_IPV6_FORWARD, value) {
                warn!(error = %e, "could not toggle IPv6 forwarding");
            }
        }

        info!(enabled, "packet forwarding updated");
        Ok(())
    }
}
