//! pcap-backed inbound frame stream

use netspoof_core::{Error, FrameSource, Packet, Result};
use parking_lot::RwLock;
use pcap::{Active, Capture, Device};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::SystemTime;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Default snapshot length (maximum bytes per packet)
const DEFAULT_SNAPLEN: i32 = 65535;

/// Read timeout; bounds how long `close` waits for the capture thread to notice
const DEFAULT_TIMEOUT_MS: i32 = 1000;

/// Frames buffered between the capture thread and the consumer
const DEFAULT_QUEUE_DEPTH: usize = 1024;

/// Configuration for packet capture
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Maximum bytes to capture per packet
    pub snaplen: i32,
    /// Timeout in milliseconds
    pub timeout_ms: i32,
    /// Enable promiscuous mode
    pub promiscuous: bool,
    /// Enable immediate mode (deliver packets immediately)
    pub immediate_mode: bool,
    /// Channel capacity; frames arriving while it is full are dropped
    pub queue_depth: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            snaplen: DEFAULT_SNAPLEN,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            promiscuous: true,
            immediate_mode: true,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

/// State of packet capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Stopped,
    Running,
}

/// Live capture on one interface, exposed as a [`FrameSource`]
pub struct PcapFrameSource {
    interface: String,
    config: CaptureConfig,
    state: Arc<RwLock<CaptureState>>,
    /// Bumped on every open so a thread from a previous session exits
    generation: Arc<AtomicU64>,
}

impl PcapFrameSource {
    pub fn new(interface: &str) -> Self {
        Self::with_config(interface, CaptureConfig::default())
    }

    pub fn with_config(interface: &str, config: CaptureConfig) -> Self {
        Self {
            interface: interface.to_string(),
            config,
            state: Arc::new(RwLock::new(CaptureState::Stopped)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn state(&self) -> CaptureState {
        *self.state.read()
    }

    fn init_capture(&self, filter: &str) -> Result<Capture<Active>> {
        debug!(interface = %self.interface, "Initializing pcap capture");

        let device = Device::from(self.interface.as_str());
        let mut capture = Capture::from_device(device)
            .map_err(|e| Error::Capture(format!("Failed to create capture: {}", e)))?
            .promisc(self.config.promiscuous)
            .snaplen(self.config.snaplen)
            .timeout(self.config.timeout_ms)
            .immediate_mode(self.config.immediate_mode)
            .open()
            .map_err(|e| Error::Capture(format!("Failed to open capture: {}", e)))?;

        capture
            .filter(filter, true)
            .map_err(|e| Error::Capture(format!("Invalid BPF filter '{}': {}", filter, e)))?;

        Ok(capture)
    }
}

impl FrameSource for PcapFrameSource {
    fn open(&self, filter: &str) -> Result<mpsc::Receiver<Packet>> {
        if self.state() == CaptureState::Running {
            return Err(Error::Capture(format!(
                "Capture already running on {}",
                self.interface
            )));
        }

        let mut capture = self.init_capture(filter)?;
        let (tx, rx) = mpsc::channel(self.config.queue_depth);

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.state.write() = CaptureState::Running;
        info!(interface = %self.interface, filter, "Starting packet capture");

        let state = Arc::clone(&self.state);
        let current = Arc::clone(&self.generation);
        let interface = self.interface.clone();

        thread::spawn(move || {
            let mut dropped = 0u64;
            loop {
                if *state.read() != CaptureState::Running
                    || current.load(Ordering::SeqCst) != generation
                {
                    debug!("Capture stopped");
                    break;
                }

                match capture.next_packet() {
                    Ok(packet) => {
                        let data = packet.data.to_vec();
                        let pkt = Packet {
                            timestamp: SystemTime::now(),
                            interface: interface.clone(),
                            len: packet.header.len as usize,
                            data,
                        };
                        match tx.try_send(pkt) {
                            Ok(()) => {}
                            Err(mpsc::error::TrySendError::Full(_)) => dropped += 1,
                            Err(mpsc::error::TrySendError::Closed(_)) => {
                                debug!("Frame consumer went away");
                                break;
                            }
                        }
                    }
                    Err(pcap::Error::TimeoutExpired) => continue,
                    Err(e) => {
                        error!(interface = %interface, error = %e, "Packet capture error");
                        break;
                    }
                }
            }

            if dropped > 0 {
                warn!(interface = %interface, dropped, "Frames dropped on a full queue");
            }
            if current.load(Ordering::SeqCst) == generation {
                *state.write() = CaptureState::Stopped;
            }
            info!(interface = %interface, "Capture thread finished");
        });

        Ok(rx)
    }

    fn close(&self) {
        if self.state() == CaptureState::Stopped {
            return;
        }
        info!(interface = %self.interface, "Stopping packet capture");
        *self.state.write() = CaptureState::Stopped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CaptureConfig::default();
        assert_eq!(config.snaplen, 65535);
        assert_eq!(config.timeout_ms, 1000);
        assert!(config.promiscuous);
        assert!(config.immediate_mode);
    }

    #[test]
    fn test_new_source_is_stopped() {
        let source = PcapFrameSource::new("nonexistent_interface_xyz");
        assert_eq!(source.state(), CaptureState::Stopped);
        source.close();
        assert_eq!(source.state(), CaptureState::Stopped);
    }

    #[test]
    fn test_open_missing_device_is_capture_error() {
        let source = PcapFrameSource::new("nonexistent_interface_xyz");
        match source.open("udp") {
            Err(Error::Capture(_)) => {}
            other => panic!("expected capture error, got {:?}", other.map(|_| ())),
        }
        assert_eq!(source.state(), CaptureState::Stopped);
    }
}
