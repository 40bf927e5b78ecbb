//! Handshake configuration
//!
//! Static values announced in our version message plus the knobs that
//! control how strictly the peer is judged.

use crate::network::address::NetworkAddress;
use crate::network::error::EncodingError;
use crate::network::message::{ServiceFlags, MAX_USER_AGENT_LEN, PROTOCOL_VERSION};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

/// Bitcoin network, identified on the wire by its magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
    Signet,
}

impl Network {
    /// Magic bytes in wire order
    pub fn magic(&self) -> [u8; 4] {
        match self {
            Network::Mainnet => [0xf9, 0xbe, 0xb4, 0xd9],
            Network::Testnet => [0x0b, 0x11, 0x09, 0x07],
            Network::Regtest => [0xfa, 0xbf, 0xb5, 0xda],
            Network::Signet => [0x0a, 0x03, 0xcf, 0x40],
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Network::Mainnet => 8333,
            Network::Testnet => 18333,
            Network::Regtest => 18444,
            Network::Signet => 38333,
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "main" | "bitcoin" => Ok(Network::Mainnet),
            "testnet" | "testnet3" | "test" => Ok(Network::Testnet),
            "regtest" => Ok(Network::Regtest),
            "signet" => Ok(Network::Signet),
            other => Err(format!("unknown network: {}", other)),
        }
    }
}

/// What to do with a command that is neither part of the handshake nor one
/// of the known informational announcements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnknownCommandPolicy {
    /// Fail until the peer's verack has been received, tolerate afterwards
    #[default]
    RejectUntilVerack,
    /// Always fail the handshake
    Reject,
    /// Always ignore
    Tolerate,
}

impl UnknownCommandPolicy {
    /// Whether an unknown command is a violation given the current ack status
    pub fn rejects(&self, peer_ack_received: bool) -> bool {
        match self {
            UnknownCommandPolicy::RejectUntilVerack => !peer_ack_received,
            UnknownCommandPolicy::Reject => true,
            UnknownCommandPolicy::Tolerate => false,
        }
    }
}

impl FromStr for UnknownCommandPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reject-until-verack" => Ok(UnknownCommandPolicy::RejectUntilVerack),
            "reject" => Ok(UnknownCommandPolicy::Reject),
            "tolerate" => Ok(UnknownCommandPolicy::Tolerate),
            other => Err(format!("unknown policy: {}", other)),
        }
    }
}

/// Handshake configuration
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    pub network: Network,
    pub protocol_version: i32,
    pub services: ServiceFlags,
    pub user_agent: String,
    /// Announced as the version nonce
    pub nonce: u64,
    pub start_height: i32,
    pub relay: bool,
    /// Address of the peer as we see it
    pub addr_recv: NetworkAddress,
    /// Our own address
    pub addr_from: NetworkAddress,
    /// A peer whose user agent contains this string is refused
    pub reserved_identity: String,
    pub unknown_commands: UnknownCommandPolicy,
    pub connect_timeout: Duration,
    /// Overall deadline for the exchange, none by default
    pub handshake_timeout: Option<Duration>,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        let services = ServiceFlags::NODE_NETWORK;
        let any = SocketAddr::from((Ipv4Addr::UNSPECIFIED, Network::Mainnet.default_port()));

        Self {
            network: Network::Mainnet,
            protocol_version: PROTOCOL_VERSION,
            services,
            user_agent: "/Satoshi:27.1.0/".to_string(),
            nonce: 12345,
            start_height: 0,
            relay: false,
            addr_recv: NetworkAddress::new(any, services),
            addr_from: NetworkAddress::new(any, services),
            reserved_identity: "satoshi".to_string(),
            unknown_commands: UnknownCommandPolicy::default(),
            connect_timeout: Duration::from_secs(10),
            handshake_timeout: None,
        }
    }
}

impl HandshakeConfig {
    pub fn magic(&self) -> [u8; 4] {
        self.network.magic()
    }

    /// Check the values that would otherwise fail while encoding
    pub fn validate(&self) -> Result<(), EncodingError> {
        if self.user_agent.len() > MAX_USER_AGENT_LEN {
            return Err(EncodingError::UserAgentTooLong(self.user_agent.len()));
        }
        Ok(())
    }

    /// Whether a peer's user agent collides with our reserved identity
    pub fn is_reserved_identity(&self, user_agent: &str) -> bool {
        !self.reserved_identity.is_empty() && user_agent.contains(&self.reserved_identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HandshakeConfig::default();
        assert_eq!(config.magic(), [0xf9, 0xbe, 0xb4, 0xd9]);
        assert_eq!(config.protocol_version, 70016);
        assert_eq!(config.addr_from.port, 8333);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_user_agent_length() {
        let config = HandshakeConfig {
            user_agent: "x".repeat(256),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(EncodingError::UserAgentTooLong(256)));
    }

    #[test]
    fn test_reserved_identity_is_case_sensitive() {
        let config = HandshakeConfig::default();
        assert!(config.is_reserved_identity("/satoshi:0.1/"));
        assert!(!config.is_reserved_identity("/Satoshi:0.7.2/"));

        let open = HandshakeConfig {
            reserved_identity: String::new(),
            ..Default::default()
        };
        assert!(!open.is_reserved_identity("/satoshi:0.1/"));
    }

    #[test]
    fn test_unknown_command_policy() {
        assert!(UnknownCommandPolicy::RejectUntilVerack.rejects(false));
        assert!(!UnknownCommandPolicy::RejectUntilVerack.rejects(true));
        assert!(UnknownCommandPolicy::Reject.rejects(true));
        assert!(!UnknownCommandPolicy::Tolerate.rejects(false));
        assert_eq!(
            "tolerate".parse::<UnknownCommandPolicy>(),
            Ok(UnknownCommandPolicy::Tolerate)
        );
    }

    #[test]
    fn test_network_parsing() {
        assert_eq!("Testnet".parse::<Network>(), Ok(Network::Testnet));
        assert_eq!(Network::Regtest.default_port(), 18444);
        assert!("litecoin".parse::<Network>().is_err());
    }
}
