//! Command-line interface
//!
//! Command handlers behind the `btc-handshake` binary.

pub mod commands;

pub use commands::{cmd_handshake, format_report, CliResult};
