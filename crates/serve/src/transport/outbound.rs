//! The write side of a connection as a serialized writer.
//!
//! [`OutboundWriter`] is the handle used by connection handlers, the
//! [`WriteDriver`] owns the transport and performs the writes. The two talk
//! through a channel: every write request carries a oneshot sender that the
//! driver consumes when the write completes, so a write is resolved exactly
//! once whichever way it ends (success, transport error, cancellation).
//!
//! At most one write can be pending. A second `write` while the first has not
//! been resolved fails with [`WriteError::ConcurrentWriteViolation`]; it does
//! not touch the first write.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::{Buf, Bytes};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use crate::protocol::{TransportError, WriteError};

#[derive(Debug)]
enum Command {
    Write(PendingWrite),
    Finish,
}

#[derive(Debug)]
struct PendingWrite {
    remaining: Bytes,
    responder: oneshot::Sender<Result<(), TransportError>>,
}

impl PendingWrite {
    /// Frees the pending slot, then hands the outcome to the caller.
    fn resolve(self, result: Result<(), TransportError>, slot: &AtomicBool) {
        slot.store(false, Ordering::Release);
        if self.responder.send(result).is_err() {
            debug!("write caller went away before the write was resolved");
        }
    }
}

/// Handle to write into one connection.
///
/// Dropping the writer has the same effect as [`finish`](Self::finish).
#[derive(Debug)]
pub struct OutboundWriter {
    commands: mpsc::UnboundedSender<Command>,
    pending: Arc<AtomicBool>,
    finished: AtomicBool,
}

impl OutboundWriter {
    /// Creates the writer and the driver that owns `transport`.
    ///
    /// The driver does the actual writes and must be polled, usually joined
    /// with the handler on the connection's task.
    pub fn new<W>(transport: W) -> (Self, WriteDriver<W>)
    where
        W: AsyncWrite + Unpin,
    {
        let (commands, receiver) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicBool::new(false));

        let writer = Self { commands, pending: Arc::clone(&pending), finished: AtomicBool::new(false) };
        let driver = WriteDriver { transport, commands: receiver, pending, failed: false, cancelled: None };
        (writer, driver)
    }

    /// Creates the writer and spawns its driver on the current runtime.
    pub fn spawn<W>(transport: W) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (writer, driver) = Self::new(transport);
        tokio::spawn(driver.run());
        writer
    }

    /// Writes all of `data`, suspending until the transport accepted every byte or failed.
    ///
    /// # Errors
    ///
    /// - [`WriteError::ConcurrentWriteViolation`] if another write is still pending
    /// - [`WriteError::Finished`] after [`finish`](Self::finish)
    /// - [`WriteError::Transport`] if the transport failed, closed or the driver was cancelled
    pub async fn write(&self, data: impl Into<Bytes>) -> Result<(), WriteError> {
        if self.finished.load(Ordering::Acquire) {
            error!("write called after the writer was finished");
            return Err(WriteError::Finished);
        }

        if self.pending.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            error!("write called while another write is pending");
            return Err(WriteError::ConcurrentWriteViolation);
        }

        let (responder, response) = oneshot::channel();
        let command = Command::Write(PendingWrite { remaining: data.into(), responder });
        if self.commands.send(command).is_err() {
            self.pending.store(false, Ordering::Release);
            return Err(TransportError::Cancelled.into());
        }

        match response.await {
            Ok(result) => result.map_err(WriteError::from),
            // the driver dropped the write without resolving it
            Err(_) => {
                self.pending.store(false, Ordering::Release);
                Err(TransportError::Cancelled.into())
            }
        }
    }

    /// Closes the write side of the transport once the pending write, if any, is done.
    ///
    /// Calling `finish` again does nothing. Writes after `finish` fail with
    /// [`WriteError::Finished`].
    pub fn finish(&self) {
        if !self.close() {
            debug!("writer already finished");
        }
    }

    /// Returns `false` when the writer was already closed.
    fn close(&self) -> bool {
        if self.finished.swap(true, Ordering::AcqRel) {
            return false;
        }

        // a closed channel means the driver is already gone
        let _ = self.commands.send(Command::Finish);
        true
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Whether a write is in flight.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

impl Drop for OutboundWriter {
    fn drop(&mut self) {
        self.close();
    }
}

/// Owns the transport of an [`OutboundWriter`] and performs its writes.
#[derive(Debug)]
pub struct WriteDriver<W> {
    transport: W,
    commands: mpsc::UnboundedReceiver<Command>,
    pending: Arc<AtomicBool>,
    failed: bool,
    cancelled: Option<CancellationToken>,
}

impl<W> WriteDriver<W>
where
    W: AsyncWrite + Unpin,
{
    /// Resolves the pending write with [`TransportError::Cancelled`] and stops
    /// the driver once `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancelled = Some(token);
        self
    }

    /// Serves write requests until the writer is finished, dropped or cancelled,
    /// then shuts down the write side of the transport.
    pub async fn run(mut self) {
        let cancelled = self.cancelled.take().unwrap_or_default();

        loop {
            let command = tokio::select! {
                biased;
                () = cancelled.cancelled() => {
                    debug!("outbound writer cancelled");
                    break;
                }
                command = self.commands.recv() => command,
            };

            match command {
                Some(Command::Write(pending)) => self.drive(pending, &cancelled).await,
                Some(Command::Finish) => {
                    debug!("outbound writer finished");
                    break;
                }
                None => {
                    debug!("outbound writer dropped");
                    break;
                }
            }
        }

        if let Err(e) = self.transport.shutdown().await {
            debug!(cause = %e, "failed to shutdown outbound transport");
        }
    }

    async fn drive(&mut self, mut pending: PendingWrite, cancelled: &CancellationToken) {
        let result = if self.failed {
            Err(TransportError::ClosedUnexpectedly)
        } else {
            tokio::select! {
                biased;
                () = cancelled.cancelled() => Err(TransportError::Cancelled),
                result = write_remaining(&mut self.transport, &mut pending.remaining) => result,
            }
        };

        if let Err(e) = &result {
            debug!(cause = %e, "write failed");
            self.failed = true;
        }

        pending.resolve(result, &self.pending);
    }
}

/// Writes `remaining` until it is empty, shrinking it by every accepted prefix.
///
/// When the transport has no room, `write` suspends until it signals
/// writability again; a write is never retried before that.
async fn write_remaining<W>(transport: &mut W, remaining: &mut Bytes) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    while !remaining.is_empty() {
        let written = transport.write(&remaining[..]).await.map_err(TransportError::write)?;
        if written == 0 {
            return Err(TransportError::ClosedUnexpectedly);
        }

        remaining.advance(written);
        trace!(written, remaining = remaining.len(), "wrote to transport");
    }

    transport.flush().await.map_err(TransportError::write)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::io::ErrorKind;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::task::{Context, Poll};
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct Recorded {
        written: Vec<u8>,
        accepted_writes: usize,
        shutdown: bool,
    }

    #[derive(Debug, Clone, Copy)]
    enum Behavior {
        /// Accepts at most this many bytes, then waits for the next writability event.
        Throttled(usize),
        /// Never becomes writable.
        Stuck,
        Fail(ErrorKind),
        Zero,
    }

    struct MockTransport {
        behavior: Behavior,
        writable: bool,
        recorded: Arc<Mutex<Recorded>>,
    }

    impl MockTransport {
        fn new(behavior: Behavior) -> (Self, Arc<Mutex<Recorded>>) {
            let recorded = Arc::new(Mutex::new(Recorded::default()));
            (Self { behavior, writable: false, recorded: Arc::clone(&recorded) }, recorded)
        }
    }

    impl AsyncWrite for MockTransport {
        fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
            match self.behavior {
                Behavior::Throttled(max) => {
                    if !self.writable {
                        // readiness arrives later, on a fresh poll
                        self.writable = true;
                        cx.waker().wake_by_ref();
                        return Poll::Pending;
                    }
                    self.writable = false;

                    let amt = std::cmp::min(max, buf.len());
                    let mut recorded = self.recorded.lock().unwrap();
                    recorded.written.extend_from_slice(&buf[..amt]);
                    recorded.accepted_writes += 1;
                    Poll::Ready(Ok(amt))
                }
                Behavior::Stuck => Poll::Pending,
                Behavior::Fail(kind) => Poll::Ready(Err(io::Error::from(kind))),
                Behavior::Zero => Poll::Ready(Ok(0)),
            }
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            self.recorded.lock().unwrap().shutdown = true;
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn partial_writes_complete_after_all_bytes() {
        let (transport, recorded) = MockTransport::new(Behavior::Throttled(3));
        let (writer, driver) = OutboundWriter::new(transport);
        let driver = tokio::spawn(driver.run());

        writer.write(&b"hello world"[..]).await.unwrap();

        {
            let recorded = recorded.lock().unwrap();
            assert_eq!(recorded.written, b"hello world");
            assert_eq!(recorded.accepted_writes, 4);
        }
        assert!(!writer.is_pending());

        writer.write(Bytes::from_static(b"!")).await.unwrap();
        assert_eq!(recorded.lock().unwrap().written, b"hello world!");

        writer.finish();
        driver.await.unwrap();
        assert!(recorded.lock().unwrap().shutdown);
    }

    #[tokio::test]
    async fn second_write_while_pending_is_rejected() {
        let (transport, recorded) = MockTransport::new(Behavior::Throttled(2));
        let writer = OutboundWriter::spawn(transport);

        let (first, second) = tokio::join!(writer.write(&b"first payload"[..]), writer.write(&b"second"[..]));

        first.unwrap();
        assert!(matches!(second, Err(WriteError::ConcurrentWriteViolation)));
        assert_eq!(recorded.lock().unwrap().written, b"first payload");

        writer.write(&b"-next"[..]).await.unwrap();
        assert_eq!(recorded.lock().unwrap().written, b"first payload-next");
    }

    #[tokio::test]
    async fn write_after_finish_fails_immediately() {
        let (transport, recorded) = MockTransport::new(Behavior::Throttled(16));
        let (writer, driver) = OutboundWriter::new(transport);
        let driver = tokio::spawn(driver.run());

        writer.write(&b"data"[..]).await.unwrap();
        writer.finish();
        writer.finish();
        assert!(writer.is_finished());

        assert!(matches!(writer.write(&b"late"[..]).await, Err(WriteError::Finished)));

        tokio::time::timeout(Duration::from_secs(5), driver).await.unwrap().unwrap();
        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.written, b"data");
        assert!(recorded.shutdown);
    }

    #[tokio::test]
    async fn transport_error_resolves_pending_write() {
        let (transport, _recorded) = MockTransport::new(Behavior::Fail(ErrorKind::BrokenPipe));
        let writer = OutboundWriter::spawn(transport);

        match writer.write(&b"data"[..]).await {
            Err(WriteError::Transport(TransportError::Write { source })) => assert_eq!(source.kind(), ErrorKind::BrokenPipe),
            other => panic!("unexpected result: {other:?}"),
        }

        assert!(matches!(writer.write(&b"again"[..]).await, Err(WriteError::Transport(TransportError::ClosedUnexpectedly))));
    }

    #[tokio::test]
    async fn zero_length_write_means_closed() {
        let (transport, _recorded) = MockTransport::new(Behavior::Zero);
        let writer = OutboundWriter::spawn(transport);

        assert!(matches!(writer.write(&b"data"[..]).await, Err(WriteError::Transport(TransportError::ClosedUnexpectedly))));
    }

    #[tokio::test]
    async fn cancellation_unblocks_pending_write() {
        let (transport, recorded) = MockTransport::new(Behavior::Stuck);
        let token = CancellationToken::new();
        let (writer, driver) = OutboundWriter::new(transport);
        let driver = tokio::spawn(driver.with_cancellation(token.clone()).run());

        let canceller = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            assert!(writer.is_pending());
            token.cancel();
        };

        let (result, ()) = tokio::join!(writer.write(&b"data"[..]), canceller);
        assert!(matches!(result, Err(WriteError::Transport(TransportError::Cancelled))));
        assert!(!writer.is_pending());

        tokio::time::timeout(Duration::from_secs(5), driver).await.unwrap().unwrap();
        assert!(recorded.lock().unwrap().shutdown);

        assert!(matches!(writer.write(&b"data"[..]).await, Err(WriteError::Transport(TransportError::Cancelled))));
    }

    #[tokio::test]
    async fn dropped_driver_cancels_writes() {
        let (transport, _recorded) = MockTransport::new(Behavior::Throttled(4));
        let (writer, driver) = OutboundWriter::new(transport);
        drop(driver);

        assert!(matches!(writer.write(&b"data"[..]).await, Err(WriteError::Transport(TransportError::Cancelled))));
        assert!(!writer.is_pending());
    }

    #[tokio::test]
    async fn dropping_writer_shuts_down_transport() {
        let (transport, recorded) = MockTransport::new(Behavior::Throttled(4));
        let (writer, driver) = OutboundWriter::new(transport);
        let driver = tokio::spawn(driver.run());

        drop(writer);

        tokio::time::timeout(Duration::from_secs(5), driver).await.unwrap().unwrap();
        assert!(recorded.lock().unwrap().shutdown);
    }

    #[tokio::test]
    async fn empty_write_succeeds() {
        let (transport, recorded) = MockTransport::new(Behavior::Throttled(4));
        let writer = OutboundWriter::spawn(transport);

        writer.write(Bytes::new()).await.unwrap();
        assert_eq!(recorded.lock().unwrap().accepted_writes, 0);
    }
}
