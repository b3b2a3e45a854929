use std::fmt;
use std::net::{SocketAddr, SocketAddrV4, SocketAddrV6};

use crate::address::{InternetAddress, Ip};

/// Address family of a [`SocketEndpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    Inet,
    Inet6,
}

/// An address and port, ready to bind.
///
/// The wire port is kept in network byte order the way it is laid out in
/// `sockaddr_in` / `sockaddr_in6`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketEndpoint {
    address: InternetAddress,
    port: u16,
    wire_port: u16,
    socket_addr: SocketAddr,
}

impl SocketEndpoint {
    pub fn new(address: InternetAddress, port: u16) -> Self {
        let socket_addr = match address.ip() {
            Ip::V4(ip) => SocketAddr::V4(SocketAddrV4::new(ip, port)),
            Ip::V6(ip) => SocketAddr::V6(SocketAddrV6::new(ip, port, 0, 0)),
        };

        Self { address, port, wire_port: port.to_be(), socket_addr }
    }

    pub fn address(&self) -> &InternetAddress {
        &self.address
    }

    pub fn family(&self) -> AddressFamily {
        match self.socket_addr {
            SocketAddr::V4(_) => AddressFamily::Inet,
            SocketAddr::V6(_) => AddressFamily::Inet6,
        }
    }

    /// Port in host byte order.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Port as stored in the socket address structure, i.e. in network byte order.
    pub fn wire_port(&self) -> u16 {
        self.wire_port
    }

    /// The bytes of [`wire_port`](Self::wire_port) in memory order.
    pub fn wire_port_bytes(&self) -> [u8; 2] {
        self.wire_port.to_ne_bytes()
    }

    pub fn socket_addr(&self) -> SocketAddr {
        self.socket_addr
    }
}

impl From<&SocketEndpoint> for SocketAddr {
    fn from(endpoint: &SocketEndpoint) -> Self {
        endpoint.socket_addr
    }
}

impl fmt::Display for SocketEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.socket_addr.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn ipv4_endpoint() {
        let endpoint = SocketEndpoint::new(InternetAddress::parse("10.0.0.1").unwrap(), 8080);

        assert_eq!(endpoint.family(), AddressFamily::Inet);
        assert_eq!(endpoint.port(), 8080);
        assert_eq!(endpoint.socket_addr(), SocketAddr::from((Ipv4Addr::new(10, 0, 0, 1), 8080)));
        assert_eq!(endpoint.to_string(), "10.0.0.1:8080");
    }

    #[test]
    fn ipv6_endpoint() {
        let endpoint = SocketEndpoint::new(InternetAddress::parse("::1").unwrap(), 443);

        assert_eq!(endpoint.family(), AddressFamily::Inet6);
        assert_eq!(endpoint.socket_addr(), SocketAddr::from((Ipv6Addr::LOCALHOST, 443)));
        assert_eq!(endpoint.to_string(), "[::1]:443");
    }

    #[test]
    fn wire_port_is_network_byte_order() {
        for text in ["127.0.0.1", "0.0.0.0", "::", "2001:db8::8"] {
            for port in [0u16, 1, 80, 255, 256, 8080, 0x1234, u16::MAX] {
                let endpoint = SocketEndpoint::new(InternetAddress::parse(text).unwrap(), port);

                assert_eq!(endpoint.wire_port_bytes(), port.to_be_bytes());
                assert_eq!(u16::from_be(endpoint.wire_port()), port);
                assert_eq!(endpoint.socket_addr().port(), port);
            }
        }
    }
}
