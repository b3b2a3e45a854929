//! Listening socket and the stream of accepted connections.

use std::fmt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use futures::Stream;
use futures::stream::FusedStream;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::time::Sleep;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::{debug, info, warn};

use crate::address::{AddressFamily, SocketEndpoint};
use crate::protocol::{BindError, ListenerError};
use crate::transport::Connection;

/// Maximum number of pending connections in the accept queue.
pub const DEFAULT_BACKLOG: u32 = 1024;

/// Pause after a failed accept, so a persistent error like `EMFILE` does not spin.
pub const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Called for every failed accept. Accept errors never end the [`Incoming`] stream.
pub type AcceptErrorHook = Arc<dyn Fn(&io::Error) + Send + Sync>;

/// Source of accepted streams behind [`Incoming`].
trait Accept: Send + Sync {
    fn poll_accept(&self, cx: &mut Context<'_>) -> Poll<io::Result<(TcpStream, SocketAddr)>>;
}

impl Accept for TcpListener {
    fn poll_accept(&self, cx: &mut Context<'_>) -> Poll<io::Result<(TcpStream, SocketAddr)>> {
        TcpListener::poll_accept(self, cx)
    }
}

/// Owns one bound, listening socket.
///
/// The accepted connections are handed out through [`Listener::incoming`],
/// which can be taken only once.
pub struct Listener {
    local_addr: SocketAddr,
    listener: Option<TcpListener>,
    stopped: CancellationToken,
    on_accept_error: Option<AcceptErrorHook>,
}

impl Listener {
    /// Creates a socket for the endpoint's address family, binds and listens.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(endpoint: &SocketEndpoint) -> Result<Self, BindError> {
        Self::bind_with_backlog(endpoint, DEFAULT_BACKLOG)
    }

    pub fn bind_with_backlog(endpoint: &SocketEndpoint, backlog: u32) -> Result<Self, BindError> {
        let addr = endpoint.socket_addr();

        let socket = match endpoint.family() {
            AddressFamily::Inet => TcpSocket::new_v4(),
            AddressFamily::Inet6 => TcpSocket::new_v6(),
        }
        .map_err(|source| BindError::Socket { endpoint: addr, source })?;

        socket.set_reuseaddr(true).map_err(|source| BindError::Socket { endpoint: addr, source })?;
        socket.bind(addr).map_err(|source| BindError::Bind { endpoint: addr, source })?;

        let listener = socket.listen(backlog).map_err(|source| BindError::Listen { endpoint: addr, source })?;
        let local_addr = listener.local_addr().map_err(|source| BindError::Listen { endpoint: addr, source })?;

        info!(%local_addr, backlog, "start listening");
        Ok(Self { local_addr, listener: Some(listener), stopped: CancellationToken::new(), on_accept_error: None })
    }

    #[must_use]
    pub fn with_accept_error_hook(mut self, hook: AcceptErrorHook) -> Self {
        self.on_accept_error = Some(hook);
        self
    }

    /// The bound address, with the actual port when bound to port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Takes the stream of accepted connections.
    ///
    /// The stream is not restartable: a second call fails with
    /// [`ListenerError::AlreadyConsumed`].
    pub fn incoming(&mut self) -> Result<Incoming, ListenerError> {
        if self.stopped.is_cancelled() {
            return Err(ListenerError::Stopped);
        }

        let listener = self.listener.take().ok_or(ListenerError::AlreadyConsumed)?;
        Ok(Incoming::new(Box::new(listener), self.stopped.clone(), self.on_accept_error.clone()))
    }

    /// Closes the listening socket and completes the [`Incoming`] stream.
    ///
    /// An accept in flight is abandoned. Calling `stop` again does nothing.
    pub fn stop(&mut self) {
        if self.stopped.is_cancelled() {
            return;
        }

        self.stopped.cancel();
        drop(self.listener.take());
        info!(local_addr = %self.local_addr, "stop listening");
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.is_cancelled()
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("local_addr", &self.local_addr)
            .field("consumed", &self.listener.is_none())
            .field("stopped", &self.stopped.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Unbounded stream of accepted connections, ends only when the listener is stopped.
///
/// A failed accept is logged, reported to the accept error hook and followed
/// by a pause of [`ACCEPT_ERROR_BACKOFF`] before the next accept.
pub struct Incoming {
    acceptor: Option<Box<dyn Accept>>,
    stopped: Pin<Box<WaitForCancellationFutureOwned>>,
    backoff: Option<Pin<Box<Sleep>>>,
    on_accept_error: Option<AcceptErrorHook>,
}

impl Incoming {
    fn new(acceptor: Box<dyn Accept>, stopped: CancellationToken, on_accept_error: Option<AcceptErrorHook>) -> Self {
        Self { acceptor: Some(acceptor), stopped: Box::pin(stopped.cancelled_owned()), backoff: None, on_accept_error }
    }
}

impl Stream for Incoming {
    type Item = Connection;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            let Some(acceptor) = &this.acceptor else {
                return Poll::Ready(None);
            };

            if this.stopped.as_mut().poll(cx).is_ready() {
                debug!("listener stopped, accept stream finished");
                this.acceptor = None;
                this.backoff = None;
                return Poll::Ready(None);
            }

            if let Some(backoff) = this.backoff.as_mut() {
                ready!(backoff.as_mut().poll(cx));
                this.backoff = None;
            }

            match ready!(acceptor.poll_accept(cx)) {
                Ok((stream, peer_addr)) => {
                    debug!(%peer_addr, "accepted connection");
                    return Poll::Ready(Some(Connection::new(stream, peer_addr)));
                }
                Err(e) => {
                    warn!(cause = %e, backoff = ?ACCEPT_ERROR_BACKOFF, "failed to accept");
                    if let Some(hook) = &this.on_accept_error {
                        hook(&e);
                    }
                    this.backoff = Some(Box::pin(tokio::time::sleep(ACCEPT_ERROR_BACKOFF)));
                }
            }
        }
    }
}

impl FusedStream for Incoming {
    fn is_terminated(&self) -> bool {
        self.acceptor.is_none()
    }
}

impl fmt::Debug for Incoming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Incoming")
            .field("terminated", &self.acceptor.is_none())
            .field("backing_off", &self.backoff.is_some())
            .finish_non_exhaustive()
    }
}
