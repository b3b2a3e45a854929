use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::protocol::AddressError;

/// An IPv4 or IPv6 address together with the text it was parsed from.
///
/// Text containing a `.` is parsed as IPv4 and text containing a `:` as IPv6.
/// Anything else is rejected, there is no host name resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InternetAddress {
    ip: Ip,
    value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ip {
    V4(Ipv4Addr),
    V6(Ipv6Addr),
}

impl InternetAddress {
    /// `127.0.0.1`, the default bind address.
    pub const LOOPBACK: &'static str = "127.0.0.1";

    pub fn parse(value: &str) -> Result<Self, AddressError> {
        let ip = if value.contains('.') {
            Ipv4Addr::from_str(value).map(Ip::V4).map_err(|_| AddressError::invalid_address(value))?
        } else if value.contains(':') {
            Ipv6Addr::from_str(value).map(Ip::V6).map_err(|_| AddressError::invalid_address(value))?
        } else {
            return Err(AddressError::invalid_address(value));
        };

        Ok(Self { ip, value: value.to_owned() })
    }

    pub fn loopback() -> Self {
        Self { ip: Ip::V4(Ipv4Addr::LOCALHOST), value: Self::LOOPBACK.to_owned() }
    }

    pub fn ip(&self) -> Ip {
        self.ip
    }

    pub fn ip_addr(&self) -> IpAddr {
        match self.ip {
            Ip::V4(ip) => IpAddr::V4(ip),
            Ip::V6(ip) => IpAddr::V6(ip),
        }
    }

    pub fn is_ipv4(&self) -> bool {
        matches!(self.ip, Ip::V4(_))
    }

    pub fn is_ipv6(&self) -> bool {
        matches!(self.ip, Ip::V6(_))
    }

    /// The text this address was created from.
    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl Default for InternetAddress {
    fn default() -> Self {
        Self::loopback()
    }
}

impl FromStr for InternetAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for InternetAddress {
    type Error = AddressError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl fmt::Display for InternetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}
