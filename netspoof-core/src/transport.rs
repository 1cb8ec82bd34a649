//! I/O seams shared by every engine
//!
//! The engines never talk to the operating system directly. Frames leave
//! through a [`PacketSink`], captured traffic arrives through a
//! [`FrameSource`], and IP forwarding is toggled through [`Forwarding`].
//! Each trait is implemented once for real hardware and once in tests.

use crate::{Packet, Result};
use tokio::sync::mpsc;

/// Outbound link-layer sink
pub trait PacketSink: Send + Sync {
    /// Transmit one complete Ethernet frame
    fn send(&self, frame: &[u8]) -> Result<()>;
}

/// Live, filtered inbound frame stream
pub trait FrameSource: Send + Sync {
    /// Start capturing with a BPF filter expression
    ///
    /// Frames are delivered on the returned channel until [`close`](Self::close)
    /// is called or the receiver is dropped.
    fn open(&self, filter: &str) -> Result<mpsc::Receiver<Packet>>;

    /// Stop capturing and release the handle
    fn close(&self);
}

/// Kernel IP forwarding switch
pub trait Forwarding: Send + Sync {
    fn is_forwarding_enabled(&self) -> bool;

    fn set_forwarding(&self, enabled: bool) -> Result<()>;
}
