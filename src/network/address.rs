//! Network address codec
//!
//! A `net_addr` as it appears inside the version payload (no timestamp
//! prefix): services, a 16-byte IPv6 (or IPv4-mapped) address and a
//! big-endian port, 26 bytes in total.

use crate::network::error::ProtocolViolation;
use crate::network::message::ServiceFlags;
use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv6Addr, SocketAddr};

/// Encoded size of a network address
pub const ADDRESS_SIZE: usize = 26;

/// Service flags, address and port of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAddress {
    pub services: ServiceFlags,
    /// IPv6 address bytes; IPv4 is stored as `::ffff:a.b.c.d`
    pub ip: [u8; 16],
    pub port: u16,
}

impl NetworkAddress {
    pub fn new(addr: SocketAddr, services: ServiceFlags) -> Self {
        let ip = match addr.ip() {
            IpAddr::V4(v4) => v4.to_ipv6_mapped(),
            IpAddr::V6(v6) => v6,
        };

        Self {
            services,
            ip: ip.octets(),
            port: addr.port(),
        }
    }

    /// All-zero placeholder address
    pub fn unspecified() -> Self {
        Self {
            services: ServiceFlags::empty(),
            ip: [0u8; 16],
            port: 0,
        }
    }

    /// The address as an `IpAddr`, unwrapping IPv4-mapped addresses
    pub fn ip_addr(&self) -> IpAddr {
        Ipv6Addr::from(self.ip).to_canonical()
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip_addr(), self.port)
    }

    /// Write the 26-byte wire form
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u64_le(self.services.bits());
        buf.put_slice(&self.ip);
        buf.put_u16(self.port);
    }

    pub fn to_bytes(&self) -> [u8; ADDRESS_SIZE] {
        let mut out = [0u8; ADDRESS_SIZE];
        self.encode(&mut &mut out[..]);
        out
    }

    /// Read a 26-byte wire address from the front of `buf`
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self, ProtocolViolation> {
        if buf.remaining() < ADDRESS_SIZE {
            return Err(ProtocolViolation::truncated(ADDRESS_SIZE, buf.remaining()));
        }

        let services = ServiceFlags::from_bits_retain(buf.get_u64_le());
        let mut ip = [0u8; 16];
        buf.copy_to_slice(&mut ip);
        let port = buf.get_u16();

        Ok(Self { services, ip, port })
    }
}

impl Default for NetworkAddress {
    fn default() -> Self {
        Self::unspecified()
    }
}

impl std::fmt::Display for NetworkAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (services {:#x})", self.socket_addr(), self.services.bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let addr = NetworkAddress::new("10.0.0.1:8333".parse().unwrap(), ServiceFlags::NODE_NETWORK);
        let bytes = addr.to_bytes();

        assert_eq!(&bytes[..8], &1u64.to_le_bytes());
        assert_eq!(&bytes[8..20], &[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xff, 0xff]);
        assert_eq!(&bytes[20..24], &[10, 0, 0, 1]);
        // Port is big-endian, unlike every other integer in the payload
        assert_eq!(&bytes[24..], &[0x20, 0x8d]);
    }

    #[test]
    fn test_roundtrip_ipv6() {
        let addr = NetworkAddress::new(
            "[2001:db8:85a3::8a2e:370:7334]:8333".parse().unwrap(),
            ServiceFlags::NODE_NETWORK | ServiceFlags::NODE_WITNESS,
        );

        let bytes = addr.to_bytes();
        let mut buf = &bytes[..];
        let decoded = NetworkAddress::decode(&mut buf).unwrap();
        assert_eq!(decoded, addr);
        assert!(buf.is_empty());
        assert_eq!(
            decoded.socket_addr(),
            "[2001:db8:85a3::8a2e:370:7334]:8333".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_roundtrip_keeps_unknown_service_bits() {
        let addr = NetworkAddress {
            services: ServiceFlags::from_bits_retain(u64::MAX),
            ip: [7u8; 16],
            port: u16::MAX,
        };

        let bytes = addr.to_bytes();
        let mut buf = &bytes[..];
        assert_eq!(NetworkAddress::decode(&mut buf).unwrap(), addr);
    }

    #[test]
    fn test_ipv4_mapped_is_canonical() {
        let addr = NetworkAddress::new("192.168.1.1:18333".parse().unwrap(), ServiceFlags::empty());
        assert_eq!(addr.ip_addr(), "192.168.1.1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_unspecified_is_zero_filled() {
        assert_eq!(NetworkAddress::unspecified().to_bytes(), [0u8; ADDRESS_SIZE]);
    }

    #[test]
    fn test_decode_truncated() {
        let bytes = [0u8; ADDRESS_SIZE - 1];
        let err = NetworkAddress::decode(&mut &bytes[..]).unwrap_err();
        assert_eq!(err, ProtocolViolation::truncated(ADDRESS_SIZE, ADDRESS_SIZE - 1));
    }
}
