//! The capability a server needs to serve one connection.

use async_trait::async_trait;

use crate::transport::{InboundStream, InboundTransport, OutboundWriter};

/// Read buffer size used when a handler does not declare its own.
pub const DEFAULT_INBOUND_BUFFER_SIZE: usize = 1024;

/// Serves exactly one connection.
///
/// A fresh handler is created for every accepted connection, so a handler may
/// keep per-connection state in `self`.
///
/// `handle` consumes the inbound stream and drives the outbound writer. It
/// should call [`OutboundWriter::finish`] once when done, on success as well
/// as on failure; dropping the writer has the same effect.
#[async_trait]
pub trait ConnectionHandler: Send + Sized + 'static {
    /// The size of every read on the inbound side. Must be positive.
    fn inbound_buffer_size(&self) -> usize {
        DEFAULT_INBOUND_BUFFER_SIZE
    }

    async fn handle<R>(self, inbound: InboundStream<R>, outbound: OutboundWriter)
    where
        R: InboundTransport;
}
