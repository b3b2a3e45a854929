//! Address construction.
//!
//! [`InternetAddress`] validates the textual form of an ip address and
//! [`SocketEndpoint`] combines it with a port into the form used to bind.
//! Both are pure values, nothing here touches the network.

mod internet_address;
mod socket_endpoint;

pub use internet_address::InternetAddress;
pub use internet_address::Ip;
pub use socket_endpoint::AddressFamily;
pub use socket_endpoint::SocketEndpoint;
