//! P2P Networking module
//!
//! Implements the Bitcoin wire protocol pieces needed to shake hands with
//! a single peer.
//!
//! # Features
//! - Network address and version payload codecs
//! - Message framing with magic, command, length and checksum validation
//! - Concurrent reader/writer/coordinator handshake with cancellation
//! - TCP dialing with a connect timeout

pub mod address;
pub mod config;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod message;
pub mod transport;

pub use address::{NetworkAddress, ADDRESS_SIZE};
pub use config::{HandshakeConfig, Network, UnknownCommandPolicy};
pub use error::{EncodingError, HandshakeError, ProtocolViolation};
pub use frame::{
    decode_frame, decode_header, encode_frame, Frame, FrameCodec, FrameHeader, RawFrame,
    COMMAND_SIZE, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
pub use handshake::{HandshakeReport, HandshakeState, Handshaker};
pub use message::{
    Command, OutboundMessage, ServiceFlags, VersionMessage, MAX_USER_AGENT_LEN, PROTOCOL_VERSION,
};
pub use transport::{connect, Transport};
