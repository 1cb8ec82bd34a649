//! Neighbor table tracker and LAN reconciliation loop

use crate::neighbors::{
    ArpSnapshot, CommandNeighborSource, IpVersions, NeighborParser, NeighborSource, TableFormat,
};
use crate::registry::EndpointRegistry;
use async_trait::async_trait;
use netspoof_core::{
    run_blocking, CancellationToken, Engine, EngineLoop, EngineStats, EngineStatsCounters, Error,
    Interface, MacAddr, Result,
};
use parking_lot::{Mutex, RwLock};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV6, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Discard service, nothing is expected to answer
const PROBE_PORT: u16 = 9;

/// Shared, refreshable view of the kernel neighbor table
///
/// Readers always get a complete snapshot: a refresh builds the new table
/// off to the side and swaps the `Arc` under the write lock.
pub struct NeighborTracker {
    source: Box<dyn NeighborSource>,
    parser: NeighborParser,
    snapshot: RwLock<Arc<ArpSnapshot>>,
    parsed: AtomicBool,
    refreshing: Mutex<()>,
    scope_id: u32,
    probing: bool,
}

impl NeighborTracker {
    /// Tracker reading the platform neighbor table of `interface`
    pub fn new(interface: &Interface) -> Self {
        Self::with_source(
            interface,
            CommandNeighborSource::platform(),
            TableFormat::platform(),
        )
    }

    pub fn with_source(
        interface: &Interface,
        source: impl NeighborSource + 'static,
        format: TableFormat,
    ) -> Self {
        Self {
            source: Box::new(source),
            parser: NeighborParser::new(interface.name.clone(), format),
            snapshot: RwLock::new(Arc::new(ArpSnapshot::new())),
            parsed: AtomicBool::new(false),
            refreshing: Mutex::new(()),
            scope_id: interface.index,
            probing: true,
        }
    }

    /// Enable or disable [`probe`](Self::probe)
    pub fn with_probing(mut self, probing: bool) -> Self {
        self.probing = probing;
        self
    }

    pub fn interface(&self) -> &str {
        self.parser.interface()
    }

    /// Whether at least one refresh has succeeded
    pub fn is_parsed(&self) -> bool {
        self.parsed.load(Ordering::Acquire)
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<ArpSnapshot> {
        self.snapshot.read().clone()
    }

    /// Re-read the neighbor table and swap in the result
    ///
    /// On failure the previous snapshot stays in place.
    pub fn refresh(&self) -> Result<Arc<ArpSnapshot>> {
        let _exclusive = self.refreshing.lock();

        let text = self.source.fetch()?;
        let fresh = Arc::new(self.parser.parse(&text));

        *self.snapshot.write() = Arc::clone(&fresh);
        self.parsed.store(true, Ordering::Release);

        trace!(interface = self.interface(), entries = fresh.len(), "neighbor table refreshed");
        Ok(fresh)
    }

    fn ensure_fresh(&self, force: bool) -> Result<Arc<ArpSnapshot>> {
        if force || !self.is_parsed() {
            self.refresh()
        } else {
            Ok(self.snapshot())
        }
    }

    /// Hardware address of `ip`
    pub fn lookup(&self, ip: IpAddr, force: bool) -> Result<MacAddr> {
        self.ensure_fresh(force)?
            .mac_of(ip)
            .ok_or_else(|| Error::not_found(format!("no hardware address for {}", ip)))
    }

    /// Addresses of `mac`
    pub fn inverse_lookup(&self, mac: &MacAddr, force: bool) -> Result<IpVersions> {
        self.ensure_fresh(force)?
            .get(mac)
            .copied()
            .filter(|addrs| !addrs.is_empty())
            .ok_or_else(|| Error::not_found(format!("no address for {}", mac)))
    }

    /// [`refresh`](Self::refresh) on the blocking pool
    ///
    /// The table command can stall; loops use this so a slow `ip neigh`
    /// never holds up the other engines' tasks.
    pub async fn refresh_async(self: &Arc<Self>) -> Result<Arc<ArpSnapshot>> {
        let tracker = Arc::clone(self);
        run_blocking(move || tracker.refresh()).await
    }

    /// [`lookup`](Self::lookup) on the blocking pool
    pub async fn lookup_async(self: &Arc<Self>, ip: IpAddr, force: bool) -> Result<MacAddr> {
        let tracker = Arc::clone(self);
        run_blocking(move || tracker.lookup(ip, force)).await
    }

    /// [`inverse_lookup`](Self::inverse_lookup) on the blocking pool
    pub async fn inverse_lookup_async(
        self: &Arc<Self>,
        mac: MacAddr,
        force: bool,
    ) -> Result<IpVersions> {
        let tracker = Arc::clone(self);
        run_blocking(move || tracker.inverse_lookup(&mac, force)).await
    }

    /// Send a throwaway datagram so the kernel resolves `ip`
    pub fn probe(&self, ip: IpAddr) {
        if !self.probing {
            return;
        }

        let (bind, dest): (SocketAddr, SocketAddr) = match ip {
            IpAddr::V4(v4) => (
                (Ipv4Addr::UNSPECIFIED, 0).into(),
                SocketAddr::new(IpAddr::V4(v4), PROBE_PORT),
            ),
            IpAddr::V6(v6) => {
                let scope = if netspoof_core::interface::is_link_local(&v6) {
                    self.scope_id
                } else {
                    0
                };
                (
                    (Ipv6Addr::UNSPECIFIED, 0).into(),
                    SocketAddr::V6(SocketAddrV6::new(v6, PROBE_PORT, 0, scope)),
                )
            }
        };

        let sent = UdpSocket::bind(bind).and_then(|socket| socket.send_to(&[0u8], dest));
        if let Err(e) = sent {
            debug!(target_ip = %ip, error = %e, "probe failed");
        }
    }
}

/// Outcome of one reconciliation cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffReport {
    /// Endpoints inserted for the first time
    pub added: Vec<MacAddr>,
    /// Endpoints missing from or remapped in the snapshot
    pub removal_candidates: Vec<MacAddr>,
    /// Candidates whose grace period ran out
    pub purged: Vec<MacAddr>,
}

impl DiffReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removal_candidates.is_empty()
    }
}

/// Reconcile `registry` against one neighbor snapshot
pub fn diff(registry: &dyn EndpointRegistry, snapshot: &ArpSnapshot) -> DiffReport {
    let mut report = DiffReport::default();

    for endpoint in registry.endpoints() {
        let stale = match snapshot.get(&endpoint.mac) {
            None => true,
            Some(addrs) => !addrs.shares_any(&endpoint.addresses()),
        };
        if !stale {
            continue;
        }

        report.removal_candidates.push(endpoint.mac);
        if registry.remove(&endpoint.mac) {
            report.purged.push(endpoint.mac);
        }
    }

    for (mac, addrs) in snapshot.iter() {
        let matching = registry
            .get(mac)
            .map(|known| known.addresses() == *addrs)
            .unwrap_or(false);

        if matching {
            registry.touch(mac);
            continue;
        }

        match registry.add(*mac, *addrs) {
            Ok(true) => report.added.push(*mac),
            Ok(false) => {}
            Err(e) => warn!(mac = %mac, error = %e, "endpoint rejected"),
        }
    }

    report
}

/// Periodic neighbor table reconciliation, exposed as the `net.recon` engine
pub struct NetRecon {
    tracker: Arc<NeighborTracker>,
    registry: Arc<dyn EndpointRegistry>,
    period: Duration,
    lp: EngineLoop,
}

impl NetRecon {
    pub const NAME: &'static str = "net.recon";

    pub fn new(tracker: Arc<NeighborTracker>, registry: Arc<dyn EndpointRegistry>) -> Self {
        Self {
            tracker,
            registry,
            period: Duration::from_secs(1),
            lp: EngineLoop::new(Self::NAME),
        }
    }

    pub fn tracker(&self) -> &Arc<NeighborTracker> {
        &self.tracker
    }

    pub fn registry(&self) -> &Arc<dyn EndpointRegistry> {
        &self.registry
    }
}

async fn recon_loop(
    tracker: Arc<NeighborTracker>,
    registry: Arc<dyn EndpointRegistry>,
    period: Duration,
    counters: Arc<EngineStatsCounters>,
    token: CancellationToken,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let snapshot = match tracker.refresh_async().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                counters.increment_errors();
                warn!(error = %e, "neighbor table refresh failed");
                continue;
            }
        };

        let report = diff(registry.as_ref(), &snapshot);
        if !report.is_empty() {
            debug!(
                added = report.added.len(),
                candidates = report.removal_candidates.len(),
                purged = report.purged.len(),
                "registry reconciled"
            );
        }
    }
}

#[async_trait]
impl Engine for NetRecon {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Poll the neighbor table and keep the endpoint registry current"
    }

    async fn start(&self) -> Result<()> {
        let tracker = Arc::clone(&self.tracker);
        let registry = Arc::clone(&self.registry);
        let counters = self.lp.counters();
        let period = self.period;

        self.lp.spawn(move |token| recon_loop(tracker, registry, period, counters, token))?;
        info!(interface = self.tracker.interface(), "network recon started");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.lp.shutdown().await?;
        info!("network recon stopped");
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.lp.is_running()
    }

    fn stats(&self) -> EngineStats {
        self.lp.stats()
    }
}
