//! netspoof core library
//!
//! This crate provides the fundamental traits, types, and error handling
//! shared by the netspoof tracker, packet synthesis and spoofing engines.

pub mod engine;
pub mod error;
pub mod interface;
pub mod packet;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use engine::{run_blocking, Engine, EngineLoop, EngineStats, EngineStatsCounters};
pub use error::{Error, Result};
pub use interface::{Interface, InterfaceSink};
pub use packet::Packet;
pub use transport::{FrameSource, Forwarding, PacketSink};
pub use types::*;

// Engines and the tracker hand tokens to spawned loops
pub use tokio_util::sync::CancellationToken;
