//! The read side of a connection as a stream of chunks.

use std::fmt;
use std::future::Future;
use std::io;
use std::net::Shutdown;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{BufMut, Bytes, BytesMut};
use futures::Stream;
use futures::stream::FusedStream;
use socket2::SockRef;
use tokio::io::{AsyncRead, DuplexStream, ReadHalf};
use tokio::net::tcp::OwnedReadHalf;
use tokio_util::io::poll_read_buf;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::{debug, trace};

use crate::protocol::TransportError;

/// A readable transport that can be closed for further reads.
pub trait InboundTransport: AsyncRead + Unpin + Send + 'static {
    /// Stops further reads. Dropping the transport afterwards releases it.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl InboundTransport for OwnedReadHalf {
    fn close(&mut self) -> io::Result<()> {
        SockRef::from(self.as_ref()).shutdown(Shutdown::Read)
    }
}

impl<T> InboundTransport for ReadHalf<T> where T: AsyncRead + Send + 'static {}

impl InboundTransport for DuplexStream {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundState {
    /// Not polled yet, the read buffer is not allocated.
    Idle,
    /// The last read produced a chunk.
    Reading,
    /// Waiting for the transport to become readable.
    Waiting,
    /// End of stream, error or cancellation. No more chunks.
    Finished,
}

/// Ordered, single-pass stream of the chunks read from one transport.
///
/// Every poll performs one read of at most `read_buffer_size` bytes, so a
/// chunk is never larger than the buffer. A read of zero bytes ends the stream
/// without error; a read error is yielded once and ends the stream.
///
/// [`cancel`](Self::cancel), a cancelled token (see
/// [`with_cancellation`](Self::with_cancellation)) or dropping the stream
/// closes the transport, after which no further chunk is produced.
pub struct InboundStream<R>
where
    R: InboundTransport,
{
    transport: Option<R>,
    buffer: BytesMut,
    read_buffer_size: usize,
    state: InboundState,
    cancelled: Option<Pin<Box<WaitForCancellationFutureOwned>>>,
}

impl<R> InboundStream<R>
where
    R: InboundTransport,
{
    /// # Panics
    ///
    /// Panics if `read_buffer_size` is zero.
    pub fn new(transport: R, read_buffer_size: usize) -> Self {
        assert!(read_buffer_size > 0, "read buffer size must be positive");
        Self { transport: Some(transport), buffer: BytesMut::new(), read_buffer_size, state: InboundState::Idle, cancelled: None }
    }

    /// Finishes the stream and closes the transport once `token` is cancelled,
    /// even while a read is waiting for data.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancelled = Some(Box::pin(token.cancelled_owned()));
        self
    }

    pub fn state(&self) -> InboundState {
        self.state
    }

    pub fn read_buffer_size(&self) -> usize {
        self.read_buffer_size
    }

    /// Closes the transport and finishes the stream. Safe to call in any state.
    pub fn cancel(&mut self) {
        if self.state != InboundState::Finished {
            debug!("inbound stream cancelled");
        }
        self.close();
    }

    fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close() {
                debug!(cause = %e, "failed to close inbound transport");
            }
        }
        self.cancelled = None;
        self.state = InboundState::Finished;
    }
}

impl<R> Stream for InboundStream<R>
where
    R: InboundTransport,
{
    type Item = Result<Bytes, TransportError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.state == InboundState::Finished {
            return Poll::Ready(None);
        }

        let cancelled = this.cancelled.as_mut().is_some_and(|cancelled| cancelled.as_mut().poll(cx).is_ready());
        if cancelled {
            this.cancel();
            return Poll::Ready(None);
        }

        if this.state == InboundState::Idle {
            debug!(read_buffer_size = this.read_buffer_size, "inbound stream opened");
        }

        let Some(transport) = this.transport.as_mut() else {
            this.state = InboundState::Finished;
            return Poll::Ready(None);
        };

        this.buffer.reserve(this.read_buffer_size);
        let mut limited = (&mut this.buffer).limit(this.read_buffer_size);

        match poll_read_buf(Pin::new(transport), cx, &mut limited) {
            Poll::Ready(Ok(0)) => {
                debug!("inbound stream reached end of stream");
                this.close();
                Poll::Ready(None)
            }
            Poll::Ready(Ok(n)) => {
                trace!(read_bytes = n, "read chunk");
                this.state = InboundState::Reading;
                Poll::Ready(Some(Ok(this.buffer.split().freeze())))
            }
            Poll::Ready(Err(e)) => {
                debug!(cause = %e, "inbound stream read error");
                this.close();
                Poll::Ready(Some(Err(TransportError::read(e))))
            }
            Poll::Pending => {
                this.state = InboundState::Waiting;
                Poll::Pending
            }
        }
    }
}

impl<R> FusedStream for InboundStream<R>
where
    R: InboundTransport,
{
    fn is_terminated(&self) -> bool {
        self.state == InboundState::Finished
    }
}

impl<R> Drop for InboundStream<R>
where
    R: InboundTransport,
{
    fn drop(&mut self) {
        self.close();
    }
}

impl<R> fmt::Debug for InboundStream<R>
where
    R: InboundTransport,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundStream")
            .field("read_buffer_size", &self.read_buffer_size)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
