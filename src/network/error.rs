//! Error types for the wire codec and the handshake
//!
//! Failures fall into three groups: transport errors (dial, read, write),
//! protocol violations committed by the peer, and encoding errors raised
//! while building our own messages before anything is sent.

use thiserror::Error;

/// Errors raised while encoding an outbound message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("Command name is {0} bytes, the limit is 12")]
    CommandTooLong(usize),
    #[error("Command name must be ASCII: {0:?}")]
    InvalidCommand(String),
    #[error("User agent is {0} bytes, the limit is 255")]
    UserAgentTooLong(usize),
    #[error("Payload of {0} bytes exceeds the maximum message size")]
    PayloadTooLarge(usize),
}

/// Malformed or disallowed input received from the peer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolViolation {
    #[error("Truncated input: needed {needed} bytes, {remaining} remaining")]
    TruncatedInput { needed: usize, remaining: usize },
    #[error("Invalid magic bytes: expected {expected}, got {actual}")]
    BadMagic { expected: String, actual: String },
    #[error("Invalid checksum: header has {expected}, payload hashes to {actual}")]
    BadChecksum { expected: String, actual: String },
    #[error("Invalid payload length: header declares {declared}, got {actual}")]
    LengthMismatch { declared: u32, actual: usize },
    #[error("Payload of {0} bytes exceeds the maximum message size")]
    PayloadTooLarge(u32),
    #[error("User agent is not valid UTF-8")]
    MalformedUserAgent,
    #[error("Peer user agent {0:?} contains our reserved identity")]
    InvalidPeerIdentity(String),
    #[error("Unexpected command before handshake completed: {0}")]
    UnexpectedCommand(String),
}

impl ProtocolViolation {
    pub(crate) fn truncated(needed: usize, remaining: usize) -> Self {
        ProtocolViolation::TruncatedInput { needed, remaining }
    }
}

/// Handshake failure surfaced to the caller
#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),
    #[error("Connection timed out after {0:?}")]
    ConnectTimeout(std::time::Duration),
    #[error("Handshake timed out after {0:?}")]
    HandshakeTimeout(std::time::Duration),
    #[error("Protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),
    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),
    #[error("Handshake cancelled")]
    Cancelled,
    #[error("Connection task failed: {0}")]
    Task(String),
}

impl HandshakeError {
    /// Whether the peer broke the protocol (as opposed to a local or transport failure)
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, HandshakeError::Protocol(_))
    }
}
