//! Sockets and the async bridges built on them.
//!
//! A [`Listener`] accepts [`Connection`]s. Each connection is split into an
//! [`InboundStream`], which yields the bytes read from the peer, and an
//! [`OutboundWriter`], which writes to it one request at a time.

mod connection;
mod inbound;
mod listener;
mod outbound;

pub use connection::Connection;
pub use inbound::InboundState;
pub use inbound::InboundStream;
pub use inbound::InboundTransport;
pub use listener::ACCEPT_ERROR_BACKOFF;
pub use listener::AcceptErrorHook;
pub use listener::DEFAULT_BACKLOG;
pub use listener::Incoming;
pub use listener::Listener;
pub use outbound::OutboundWriter;
pub use outbound::WriteDriver;
