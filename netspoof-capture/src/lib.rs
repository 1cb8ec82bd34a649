//! Packet capture for netspoof
//!
//! Wraps a pcap handle in a background thread and exposes captured frames as
//! a tokio channel through the [`FrameSource`](netspoof_core::FrameSource)
//! trait, so async engines can `select!` on frame arrival and cancellation.
//!
//! ## Example
//!
//! ```no_run
//! use netspoof_capture::PcapFrameSource;
//! use netspoof_core::FrameSource;
//!
//! # async fn run() -> netspoof_core::Result<()> {
//! let source = PcapFrameSource::new("eth0");
//! let mut frames = source.open("udp")?;
//! while let Some(frame) = frames.recv().await {
//!     println!("{} bytes", frame.len());
//! }
//! source.close();
//! # Ok(())
//! # }
//! ```

pub mod capture;

pub use capture::{CaptureConfig, CaptureState, PcapFrameSource};
