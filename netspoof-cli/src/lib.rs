//! Command line interface for netspoof
//!
//! Argument parsing lives here so it can be tested without the binary.

pub mod args;

pub use args::{ArpArgs, Cli, Commands, DnsArgs, NdpArgs};
