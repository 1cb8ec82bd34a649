//! In-memory collaborators for engine tests

use crate::context::SpoofContext;
use netspoof_core::{Error, FrameSource, Forwarding, Interface, MacAddr, Packet, PacketSink, Result};
use netspoof_recon::{LanRegistry, NeighborTracker, TableFormat};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

pub const OWN_MAC: MacAddr = MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);

/// Sink that keeps every frame it is handed
#[derive(Default)]
pub struct RecordingSink {
    frames: Mutex<Vec<Vec<u8>>>,
}

impl RecordingSink {
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.frames.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn clear(&self) {
        self.frames.lock().clear();
    }
}

impl PacketSink for RecordingSink {
    fn send(&self, frame: &[u8]) -> Result<()> {
        self.frames.lock().push(frame.to_vec());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryForwarding {
    enabled: AtomicBool,
}

impl Forwarding for MemoryForwarding {
    fn is_forwarding_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn set_forwarding(&self, enabled: bool) -> Result<()> {
        self.enabled.store(enabled, Ordering::SeqCst);
        Ok(())
    }
}

/// Frame source fed by the test through [`ChannelFrameSource::inject`]
#[derive(Default)]
pub struct ChannelFrameSource {
    tx: Mutex<Option<mpsc::Sender<Packet>>>,
    pub fail_open: bool,
    pub closed: AtomicBool,
    pub opens: AtomicUsize,
}

impl ChannelFrameSource {
    pub fn failing() -> Self {
        Self {
            fail_open: true,
            ..Default::default()
        }
    }

    pub async fn inject(&self, data: Vec<u8>) {
        let tx = self.tx.lock().clone();
        if let Some(tx) = tx {
            tx.send(Packet::new("eth0".to_string(), data)).await.unwrap();
        }
    }
}

impl FrameSource for ChannelFrameSource {
    fn open(&self, _filter: &str) -> Result<mpsc::Receiver<Packet>> {
        if self.fail_open {
            return Err(Error::Capture("permission denied".into()));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(16);
        *self.tx.lock() = Some(tx);
        self.closed.store(false, Ordering::SeqCst);
        Ok(rx)
    }

    fn close(&self) {
        self.tx.lock().take();
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub fn interface() -> Interface {
    Interface::new("eth0", 2, OWN_MAC)
        .with_ipv4("10.0.0.5".parse().unwrap())
        .with_ipv6("fe80::5".parse().unwrap())
}

/// Tracker serving a fixed `ip neigh` table
pub fn tracker(table: &'static str) -> Arc<NeighborTracker> {
    let source = move || Ok::<_, Error>(table.to_string());
    Arc::new(
        NeighborTracker::with_source(&interface(), source, TableFormat::Linux).with_probing(false),
    )
}

pub struct Harness {
    pub ctx: SpoofContext,
    pub sink: Arc<RecordingSink>,
    pub forwarding: Arc<MemoryForwarding>,
    pub registry: Arc<LanRegistry>,
}

pub fn harness(table: &'static str) -> Harness {
    let sink = Arc::new(RecordingSink::default());
    let forwarding = Arc::new(MemoryForwarding::default());
    let registry = Arc::new(LanRegistry::for_interface(
        &interface(),
        Some("10.0.0.1".parse().unwrap()),
    ));

    let ctx = SpoofContext::new(
        interface(),
        sink.clone(),
        tracker(table),
        registry.clone(),
        forwarding.clone(),
    )
    .with_gateway("10.0.0.1".parse().unwrap());

    Harness {
        ctx,
        sink,
        forwarding,
        registry,
    }
}
