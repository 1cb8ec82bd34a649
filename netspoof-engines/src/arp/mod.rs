//! ARP cache poisoning
//!
//! Once per second the victim is told that the spoofed address lives at the
//! alias hardware address. In full-duplex mode the spoofed peer is also told
//! that the victim lives there, so both directions of the conversation flow
//! through this host.
//!
//! On stop the real mappings are re-announced unless restoration is skipped.
//!
//! ```text
//!   victim ──"spoof_ip is at alias_mac"──▶  (1 Hz)
//!   peer   ──"victim_ip is at alias_mac"──▶ (1 Hz, full-duplex only)
//! ```

mod config;
mod engine;


pub use config::ArpSpoofConfig;
pub use engine::{arp_reply_frame, ArpSpoofEngine};
