//! Server lifecycle: bind, accept, and one task per connection.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span};

use crate::address::{InternetAddress, SocketEndpoint};
use crate::handler::ConnectionHandler;
use crate::protocol::{ServerBuildError, ServerError};
use crate::transport::{AcceptErrorHook, Connection, DEFAULT_BACKLOG, InboundStream, Incoming, Listener, OutboundWriter};

pub struct ServerBuilder<F> {
    handler_factory: Option<F>,
    backlog: u32,
    on_accept_error: Option<AcceptErrorHook>,
}

impl<F> ServerBuilder<F> {
    fn new() -> Self {
        Self { handler_factory: None, backlog: DEFAULT_BACKLOG, on_accept_error: None }
    }

    /// Called once per accepted connection to create its handler.
    pub fn handler_factory(mut self, factory: F) -> Self {
        self.handler_factory = Some(factory);
        self
    }

    pub fn backlog(mut self, backlog: u32) -> Self {
        self.backlog = backlog;
        self
    }

    /// Reports accept errors, which are otherwise only logged.
    pub fn on_accept_error(mut self, hook: impl Fn(&io::Error) + Send + Sync + 'static) -> Self {
        self.on_accept_error = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> Result<Server<F>, ServerBuildError> {
        let factory = self.handler_factory.ok_or(ServerBuildError::MissingHandlerFactory)?;
        Ok(Server { factory: Arc::new(factory), backlog: self.backlog, on_accept_error: self.on_accept_error, running: None })
    }
}

impl<F> fmt::Debug for ServerBuilder<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("handler_factory", &self.handler_factory.is_some())
            .field("backlog", &self.backlog)
            .field("on_accept_error", &self.on_accept_error.is_some())
            .finish()
    }
}

struct Running {
    listener: Listener,
    accept_task: JoinHandle<()>,
    connections: CancellationToken,
    local_addr: SocketAddr,
}

/// Accepts connections and hands each one to a fresh [`ConnectionHandler`].
///
/// ```no_run
/// # use micro_serve::address::InternetAddress;
/// # use micro_serve::handler::ConnectionHandler;
/// # use micro_serve::server::Server;
/// # use micro_serve::transport::{InboundStream, InboundTransport, OutboundWriter};
/// struct Hello;
///
/// #[async_trait::async_trait]
/// impl ConnectionHandler for Hello {
///     async fn handle<R: InboundTransport>(self, _inbound: InboundStream<R>, outbound: OutboundWriter) {
///         let _ = outbound.write(&b"HTTP/1.1 204 No Content\r\n\r\n"[..]).await;
///         outbound.finish();
///     }
/// }
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut server = Server::new(|| Hello);
/// let local_addr = server.start(InternetAddress::loopback(), 8080)?;
/// println!("listening on {local_addr}");
/// # Ok(())
/// # }
/// ```
pub struct Server<F> {
    factory: Arc<F>,
    backlog: u32,
    on_accept_error: Option<AcceptErrorHook>,
    running: Option<Running>,
}

impl<F> Server<F> {
    pub fn builder() -> ServerBuilder<F> {
        ServerBuilder::new()
    }

    /// Stops accepting: ends the accept task and closes the listening socket.
    ///
    /// Connections already accepted keep running until their handler is done.
    /// Calling `stop` on a server that is not running does nothing.
    pub fn stop(&mut self) {
        let Some(mut running) = self.running.take() else {
            return;
        };

        running.accept_task.abort();
        running.listener.stop();
        info!(local_addr = %running.local_addr, "server stopped");
    }

    /// Like [`stop`](Self::stop), and also cancels every connection still in flight.
    ///
    /// Their inbound streams finish and their pending writes fail with
    /// [`TransportError::Cancelled`](crate::protocol::TransportError::Cancelled).
    pub fn shutdown(&mut self) {
        if let Some(running) = &self.running {
            running.connections.cancel();
        }
        self.stop();
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|running| running.local_addr)
    }
}

impl<F, H> Server<F>
where
    F: Fn() -> H + Send + Sync + 'static,
    H: ConnectionHandler,
{
    pub fn new(factory: F) -> Self {
        Self { factory: Arc::new(factory), backlog: DEFAULT_BACKLOG, on_accept_error: None, running: None }
    }

    /// Binds `address:port` and starts accepting connections.
    ///
    /// Returns the bound address, which carries the actual port when `port` is 0.
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`ServerError::AlreadyRunning`] if the server was started before and not
    ///   stopped; the running listener is left untouched
    /// - [`ServerError::Bind`] if the socket could not be bound
    pub fn start(&mut self, address: InternetAddress, port: u16) -> Result<SocketAddr, ServerError> {
        if self.running.is_some() {
            return Err(ServerError::AlreadyRunning);
        }

        let endpoint = SocketEndpoint::new(address, port);
        let mut listener = Listener::bind_with_backlog(&endpoint, self.backlog)?;
        if let Some(hook) = &self.on_accept_error {
            listener = listener.with_accept_error_hook(Arc::clone(hook));
        }

        let incoming = listener.incoming()?;
        let local_addr = listener.local_addr();
        let connections = CancellationToken::new();

        let accept_task = tokio::spawn(
            accept_loop(incoming, Arc::clone(&self.factory), connections.clone()).instrument(info_span!("server", %local_addr)),
        );

        info!(%local_addr, "server started");
        self.running = Some(Running { listener, accept_task, connections, local_addr });
        Ok(local_addr)
    }
}

impl<F> Drop for Server<F> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<F> fmt::Debug for Server<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("backlog", &self.backlog)
            .field("local_addr", &self.local_addr())
            .finish_non_exhaustive()
    }
}

async fn accept_loop<F, H>(mut incoming: Incoming, factory: Arc<F>, connections: CancellationToken)
where
    F: Fn() -> H + Send + Sync + 'static,
    H: ConnectionHandler,
{
    while let Some(connection) = incoming.next().await {
        let peer = connection.peer_addr();
        let handler = factory();
        let token = connections.child_token();

        tokio::spawn(serve_connection(connection, handler, token).instrument(info_span!("connection", %peer)));
    }

    debug!("accept loop finished");
}

/// Serves one connection with `handler` until the handler is done and every
/// write was flushed, or until `token` is cancelled.
///
/// The read side is wrapped in an [`InboundStream`] using the handler's
/// buffer size, the write side in an [`OutboundWriter`] whose driver runs on
/// the calling task.
pub async fn serve_connection<H>(connection: Connection, handler: H, token: CancellationToken)
where
    H: ConnectionHandler,
{
    let (reader, writer) = connection.into_split();

    let inbound = InboundStream::new(reader, handler.inbound_buffer_size()).with_cancellation(token.clone());
    let (outbound, driver) = OutboundWriter::new(writer);

    debug!("connection opened");
    tokio::join!(handler.handle(inbound, outbound), driver.with_cancellation(token).run());
    debug!("connection closed");
}
