//! btc-handshake: a single-peer Bitcoin P2P handshake client
//!
//! This crate provides:
//! - Double SHA-256 frame checksums
//! - Network address and version payload codecs
//! - Message framing with magic, length and checksum validation
//! - A concurrent version/verack handshake over any async byte stream
//!
//! # Example
//!
//! ```no_run
//! use btc_handshake::network::{connect, HandshakeConfig, Handshaker};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), btc_handshake::network::HandshakeError> {
//! let stream = connect("127.0.0.1:8333", Duration::from_secs(10)).await?;
//! let report = Handshaker::new(HandshakeConfig::default()).run(stream).await?;
//! println!("Handshake {:?}", report.state);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod crypto;
pub mod network;

// Re-export commonly used types
pub use crypto::checksum;
pub use network::{
    HandshakeConfig, HandshakeError, HandshakeReport, HandshakeState, Handshaker, Network,
    NetworkAddress, VersionMessage,
};
