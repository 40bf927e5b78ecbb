//! Network message types for the handshake
//!
//! Defines the command names we understand and the `version` payload.
//! All integers are little-endian on the wire except address ports.

use crate::network::address::NetworkAddress;
use crate::network::config::HandshakeConfig;
use crate::network::error::{EncodingError, ProtocolViolation};
use bitflags::bitflags;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol version announced by default
pub const PROTOCOL_VERSION: i32 = 70016;

/// The user agent length prefix is a single byte
pub const MAX_USER_AGENT_LEN: usize = u8::MAX as usize;

bitflags! {
    /// Services advertised in the version message
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ServiceFlags: u64 {
        /// Full node serving the complete chain
        const NODE_NETWORK = 1;
        const NODE_GETUTXO = 1 << 1;
        const NODE_BLOOM = 1 << 2;
        const NODE_WITNESS = 1 << 3;
        const NODE_COMPACT_FILTERS = 1 << 6;
        /// Serves only the last 288 blocks
        const NODE_NETWORK_LIMITED = 1 << 10;
    }
}

/// A protocol command name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    Version,
    VerAck,
    /// BIP 339 announcement, sent between version and verack
    WtxidRelay,
    /// BIP 155 announcement, sent between version and verack
    SendAddrV2,
    Other(String),
}

impl Command {
    pub fn parse(name: &str) -> Self {
        match name {
            "version" => Command::Version,
            "verack" => Command::VerAck,
            "wtxidrelay" => Command::WtxidRelay,
            "sendaddrv2" => Command::SendAddrV2,
            other => Command::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Command::Version => "version",
            Command::VerAck => "verack",
            Command::WtxidRelay => "wtxidrelay",
            Command::SendAddrV2 => "sendaddrv2",
            Command::Other(name) => name,
        }
    }

    /// Pre-handshake announcements that are accepted and ignored in any state
    pub fn is_informational(&self) -> bool {
        matches!(self, Command::WtxidRelay | Command::SendAddrV2)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `version` message payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMessage {
    pub protocol_version: i32,
    pub services: ServiceFlags,
    /// Unix seconds
    pub timestamp: i64,
    pub addr_recv: NetworkAddress,
    pub addr_from: NetworkAddress,
    pub nonce: u64,
    pub user_agent: String,
    pub start_height: i32,
    /// Absent in payloads older than protocol 70001, decoded as `false`
    pub relay: bool,
}

impl VersionMessage {
    /// Build our version message from the configuration
    pub fn from_config(config: &HandshakeConfig, timestamp: i64) -> Self {
        Self {
            protocol_version: config.protocol_version,
            services: config.services,
            timestamp,
            addr_recv: config.addr_recv,
            addr_from: config.addr_from,
            nonce: config.nonce,
            user_agent: config.user_agent.clone(),
            start_height: config.start_height,
            relay: config.relay,
        }
    }

    /// Same as [`VersionMessage::from_config`], stamped with the current time
    pub fn new_now(config: &HandshakeConfig) -> Self {
        Self::from_config(config, chrono::Utc::now().timestamp())
    }

    /// Serialize to the wire payload
    pub fn encode(&self) -> Result<Bytes, EncodingError> {
        let user_agent = self.user_agent.as_bytes();
        if user_agent.len() > MAX_USER_AGENT_LEN {
            return Err(EncodingError::UserAgentTooLong(user_agent.len()));
        }

        let mut buf = BytesMut::with_capacity(86 + user_agent.len());
        buf.put_i32_le(self.protocol_version);
        buf.put_u64_le(self.services.bits());
        buf.put_i64_le(self.timestamp);
        self.addr_recv.encode(&mut buf);
        self.addr_from.encode(&mut buf);
        buf.put_u64_le(self.nonce);
        buf.put_u8(user_agent.len() as u8);
        buf.put_slice(user_agent);
        buf.put_i32_le(self.start_height);
        buf.put_u8(self.relay as u8);

        Ok(buf.freeze())
    }

    /// Parse a version payload
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolViolation> {
        let mut buf = payload;

        ensure(&buf, 20)?;
        let protocol_version = buf.get_i32_le();
        let services = ServiceFlags::from_bits_retain(buf.get_u64_le());
        let timestamp = buf.get_i64_le();

        let addr_recv = NetworkAddress::decode(&mut buf)?;
        let addr_from = NetworkAddress::decode(&mut buf)?;

        ensure(&buf, 9)?;
        let nonce = buf.get_u64_le();
        let ua_len = buf.get_u8() as usize;

        ensure(&buf, ua_len)?;
        let user_agent = std::str::from_utf8(&buf[..ua_len])
            .map_err(|_| ProtocolViolation::MalformedUserAgent)?
            .to_string();
        buf.advance(ua_len);

        ensure(&buf, 4)?;
        let start_height = buf.get_i32_le();
        let relay = buf.has_remaining() && buf.get_u8() != 0;

        Ok(Self {
            protocol_version,
            services,
            timestamp,
            addr_recv,
            addr_from,
            nonce,
            user_agent,
            start_height,
            relay,
        })
    }
}

fn ensure(buf: &&[u8], needed: usize) -> Result<(), ProtocolViolation> {
    if buf.len() < needed {
        return Err(ProtocolViolation::truncated(needed, buf.len()));
    }
    Ok(())
}

/// A message queued for the writer, framed on its way out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub command: Command,
    pub payload: Bytes,
}

impl OutboundMessage {
    pub fn new(command: Command, payload: Bytes) -> Self {
        Self { command, payload }
    }

    pub fn version(version: &VersionMessage) -> Result<Self, EncodingError> {
        Ok(Self::new(Command::Version, version.encode()?))
    }

    pub fn verack() -> Self {
        Self::new(Command::VerAck, Bytes::new())
    }
}
