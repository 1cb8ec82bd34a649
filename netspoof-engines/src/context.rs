//! Collaborators shared by the spoofing engines
//!
//! A [`SpoofContext`] bundles the interface the engines operate on with the
//! outbound sink, the neighbor tracker, the endpoint registry and the
//! forwarding switch. It is cheap to clone and is moved into every loop task.

use netspoof_core::{run_blocking, EngineStatsCounters, Forwarding, Interface, PacketSink, Result};
use netspoof_recon::{EndpointRegistry, NeighborTracker};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct SpoofContext {
    pub interface: Interface,
    /// Default gateway, if one was discovered
    pub gateway: Option<IpAddr>,
    pub sink: Arc<dyn PacketSink>,
    pub tracker: Arc<NeighborTracker>,
    pub registry: Arc<dyn EndpointRegistry>,
    pub forwarding: Arc<dyn Forwarding>,
}

impl SpoofContext {
    pub fn new(
        interface: Interface,
        sink: Arc<dyn PacketSink>,
        tracker: Arc<NeighborTracker>,
        registry: Arc<dyn EndpointRegistry>,
        forwarding: Arc<dyn Forwarding>,
    ) -> Self {
        Self {
            interface,
            gateway: None,
            sink,
            tracker,
            registry,
            forwarding,
        }
    }

    pub fn with_gateway(mut self, gateway: IpAddr) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn gateway_v4(&self) -> Option<Ipv4Addr> {
        match self.gateway {
            Some(IpAddr::V4(v4)) => Some(v4),
            _ => None,
        }
    }

    /// Current state of the forwarding switch
    pub async fn forwarding_enabled(&self) -> Result<bool> {
        let forwarding = Arc::clone(&self.forwarding);
        run_blocking(move || Ok(forwarding.is_forwarding_enabled())).await
    }

    /// Turn forwarding on unless it already is
    pub async fn ensure_forwarding(&self) -> Result<()> {
        if self.forwarding_enabled().await? {
            return Ok(());
        }

        info!(interface = %self.interface.name, "enabling forwarding");
        let forwarding = Arc::clone(&self.forwarding);
        run_blocking(move || forwarding.set_forwarding(true)).await
    }

    /// Hand one frame to the sink, absorbing and counting failures
    pub fn send(&self, engine: &str, frame: &[u8], counters: &EngineStatsCounters) -> bool {
        match self.sink.send(frame) {
            Ok(()) => {
                counters.record_sent(frame.len());
                debug!(engine, size = frame.len(), "frame sent");
                true
            }
            Err(e) => {
                counters.increment_errors();
                warn!(engine, error = %e, "send failed");
                false
            }
        }
    }

    /// Registry alias for `ip` when known, otherwise the address itself
    pub fn describe(&self, ip: IpAddr) -> String {
        match self.registry.find_by_ip(ip).and_then(|e| e.alias) {
            Some(alias) => format!("{} ({})", alias, ip),
            None => ip.to_string(),
        }
    }
}
