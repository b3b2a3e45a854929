//! An embeddable async TCP server with just enough HTTP to answer a request
//!
//! This crate accepts connections on a listening socket and exposes every
//! connection as a pair of async primitives: a stream of the chunks read from
//! the peer and a writer that sends bytes back, one write at a time. A
//! pluggable [`handler::ConnectionHandler`] consumes the pair, typically
//! parsing an HTTP request head with the bounded [`codec::HeaderParser`] and
//! streaming a response.
//!
//! # Example
//!
//! ```no_run
//! use async_trait::async_trait;
//! use bytes::BytesMut;
//! use http::StatusCode;
//! use micro_serve::address::InternetAddress;
//! use micro_serve::codec::{HeaderParser, read_request};
//! use micro_serve::handler::ConnectionHandler;
//! use micro_serve::protocol::{ResponseHead, error_response};
//! use micro_serve::server::Server;
//! use micro_serve::transport::{InboundStream, InboundTransport, OutboundWriter};
//! use tracing::{Level, error, info};
//! use tracing_subscriber::FmtSubscriber;
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl ConnectionHandler for Echo {
//!     async fn handle<R: InboundTransport>(self, mut inbound: InboundStream<R>, outbound: OutboundWriter) {
//!         let response = match read_request(&mut inbound, HeaderParser::new()).await {
//!             Ok(request) => {
//!                 let mut response = BytesMut::new();
//!                 ResponseHead::ok().content_length(request.body().len() as u64).encode(&mut response);
//!                 response.extend_from_slice(request.body());
//!                 response.freeze()
//!             }
//!             Err(e) => match e.status() {
//!                 Some(status) => error_response(status).to_bytes(),
//!                 None => {
//!                     outbound.finish();
//!                     return;
//!                 }
//!             },
//!         };
//!
//!         if let Err(e) = outbound.write(response).await {
//!             error!(cause = %e, "failed to write response");
//!         }
//!         outbound.finish();
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
//!     tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
//!
//!     let mut server = Server::new(|| Echo);
//!     match server.start(InternetAddress::loopback(), 8080) {
//!         Ok(local_addr) => info!(%local_addr, "echo server started"),
//!         Err(e) => {
//!             error!(cause = %e, "failed to start server");
//!             return;
//!         }
//!     }
//!
//!     tokio::signal::ctrl_c().await.expect("failed to listen for ctrl-c");
//!     server.shutdown();
//! }
//! ```
//!
//! # Architecture
//!
//! - [`address`]: textual ip address and port to a bindable endpoint
//! - [`transport`]: the listener, the inbound chunk stream and the outbound writer
//! - [`codec`]: the incremental header parser and request reading
//! - [`protocol`]: request/response types, status reasons and the error types
//! - [`handler`]: the per-connection handler capability
//! - [`server`]: the accept loop and the start/stop lifecycle
//!
//! # Error Handling
//!
//! Errors are plain enums, one per layer:
//!
//! - [`protocol::AddressError`], [`protocol::BindError`] and
//!   [`protocol::ServerError`] are returned synchronously while starting
//! - [`protocol::TransportError`] and [`protocol::WriteError`] stay local to
//!   the connection they happened on
//! - [`protocol::ParseError`] knows the status of the error response to send,
//!   see [`protocol::ParseError::status`]
//!
//! # Limitations
//!
//! - one request per connection, no keep-alive or pipelining
//! - no chunked transfer encoding, request bodies need a `Content-Length`
//! - no TLS
//! - maximum header size: 8KB unless configured otherwise

pub mod address;
pub mod codec;
pub mod handler;
pub mod protocol;
pub mod server;
pub mod transport;

mod utils;
pub(crate) use utils::ensure;
