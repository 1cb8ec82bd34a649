//! DNS spoofing
//!
//! Captured UDP traffic is filtered for standard DNS queries. When a
//! question matches the host table, a reply is forged with the link,
//! network and transport addresses of the query swapped, so the victim
//! accepts it as coming from the resolver it asked.

mod engine;
pub mod hosts;
pub mod reply;


pub use engine::{DnsSpoofConfig, DnsSpoofEngine, CAPTURE_FILTER, DEFAULT_TTL};
pub use hosts::{HostEntry, HostTable};
pub use reply::{build_reply, reply_message, CapturedQuery};
