use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use http::{HeaderValue, header};
use micro_serve::codec::{HeaderParser, read_request};
use micro_serve::handler::ConnectionHandler;
use micro_serve::protocol::{ResponseHead, SERVER_NAME, error_response};
use micro_serve::transport::{InboundStream, InboundTransport, OutboundWriter};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, error, info, warn};

use crate::{FileError, FileHandlerConfig, FileProvider, mime_for_path};

/// Answers one request with the content of a file.
///
/// The response is a `200 OK` head followed by the file, streamed in writes of
/// at most `output_buffer_size` bytes; the first write carries the head and
/// the start of the file. Failures before the head was written are answered
/// with an empty error response, see [`FileError::status`]. The connection is
/// closed after every response.
pub struct FileStreamHandler<P> {
    provider: Arc<P>,
    config: FileHandlerConfig,
}

impl<P> FileStreamHandler<P>
where
    P: FileProvider,
{
    pub fn new(provider: Arc<P>) -> Self {
        Self::with_config(provider, FileHandlerConfig::default())
    }

    pub fn with_config(provider: Arc<P>, config: FileHandlerConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &FileHandlerConfig {
        &self.config
    }

    async fn serve<R>(&self, inbound: &mut InboundStream<R>, outbound: &OutboundWriter) -> Result<(), FileError>
    where
        R: InboundTransport,
    {
        let request = read_request(inbound, HeaderParser::with_max_size(self.config.max_header_size())).await?;
        info!(method = %request.header().method(), path = request.header().path(), "receive request");

        let path = self.provider.resolve(&request).await?;
        let (file, size) = open(&path).await?;

        let head = ResponseHead::ok()
            .header(header::SERVER, HeaderValue::from_static(SERVER_NAME))
            .header(header::CONNECTION, HeaderValue::from_static("close"))
            .header(header::CONTENT_TYPE, content_type(&path))
            .content_length(size);

        let sent = send(outbound, &head, file, size, self.config.output_buffer_size()).await?;
        if sent < size {
            warn!(file = %path.display(), size, sent, "file shrank while it was sent");
        } else {
            debug!(file = %path.display(), size, "file sent");
        }
        Ok(())
    }

    async fn respond_with_error(error: &FileError, outbound: &OutboundWriter) {
        let Some(status) = error.status() else {
            debug!(cause = %error, "close connection without response");
            return;
        };

        if status.is_server_error() {
            error!(cause = %error, status = status.as_u16(), "failed to serve request");
        } else {
            warn!(cause = %error, status = status.as_u16(), "reject request");
        }

        if let Err(e) = outbound.write(error_response(status).to_bytes()).await {
            error!(cause = %e, "failed to write error response");
        }
    }
}

#[async_trait]
impl<P> ConnectionHandler for FileStreamHandler<P>
where
    P: FileProvider,
{
    fn inbound_buffer_size(&self) -> usize {
        self.config.inbound_buffer_size()
    }

    async fn handle<R>(self, mut inbound: InboundStream<R>, outbound: OutboundWriter)
    where
        R: InboundTransport,
    {
        if let Err(e) = self.serve(&mut inbound, &outbound).await {
            Self::respond_with_error(&e, &outbound).await;
        }
        outbound.finish();
    }
}

impl<P> std::fmt::Debug for FileStreamHandler<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStreamHandler").field("config", &self.config).finish_non_exhaustive()
    }
}

async fn open(path: &Path) -> Result<(File, u64), FileError> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => metadata,
        Ok(_) => return Err(FileError::not_found(path)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(FileError::not_found(path)),
        Err(source) => return Err(FileError::Open { path: path.to_owned(), source }),
    };

    let file = File::open(path).await.map_err(|source| FileError::Open { path: path.to_owned(), source })?;
    Ok((file, metadata.len()))
}

fn content_type(path: &Path) -> HeaderValue {
    let mime = mime_for_path(path);
    HeaderValue::from_str(mime.as_ref()).unwrap_or(HeaderValue::from_static("application/octet-stream"))
}

/// Writes `head` followed by at most `size` bytes of `file`, in writes of at
/// most `output_buffer_size` bytes. The first write carries the head and the
/// start of the file. Returns the number of file bytes sent.
async fn send<F>(outbound: &OutboundWriter, head: &ResponseHead, file: F, size: u64, output_buffer_size: usize) -> Result<u64, FileError>
where
    F: AsyncRead + Unpin,
{
    // never send more than the announced content length, even if the file grew
    let mut file = file.take(size);

    let mut buffer = BytesMut::with_capacity(output_buffer_size);
    head.encode(&mut buffer);
    let head_size = buffer.len();

    // the head may exceed a small output buffer, it is never split
    let first_write_size = output_buffer_size.max(head_size);
    fill(&mut file, &mut buffer, first_write_size).await?;

    let mut sent = 0;
    loop {
        sent += buffer.len();
        outbound.write(buffer.split().freeze()).await?;

        fill(&mut file, &mut buffer, output_buffer_size).await?;
        if buffer.is_empty() {
            break;
        }
    }

    Ok(u64::try_from(sent - head_size).unwrap_or(u64::MAX))
}

/// Reads from `file` until `buffer` holds `limit` bytes or the file ends.
async fn fill<F>(file: &mut F, buffer: &mut BytesMut, limit: usize) -> Result<(), FileError>
where
    F: AsyncRead + Unpin,
{
    while buffer.len() < limit {
        let remaining = limit - buffer.len();
        buffer.reserve(remaining);

        let read = file.read_buf(&mut (&mut *buffer).limit(remaining)).await.map_err(|source| FileError::Read { source })?;
        if read == 0 {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DirectoryProvider;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncWrite, AsyncWriteExt, ReadBuf};

    /// Records every write it receives.
    #[derive(Clone, Default)]
    struct RecordingWriter {
        writes: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl AsyncWrite for RecordingWriter {
        fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
            self.writes.lock().unwrap().push(buf.to_vec());
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    struct RequestReader(&'static [u8]);

    impl AsyncRead for RequestReader {
        fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
            let amt = std::cmp::min(self.0.len(), buf.remaining());
            buf.put_slice(&self.0[..amt]);
            self.0 = &self.0[amt..];
            Poll::Ready(Ok(()))
        }
    }

    impl InboundTransport for RequestReader {}

    async fn run(handler: FileStreamHandler<DirectoryProvider>, request: &'static [u8]) -> Vec<Vec<u8>> {
        let recording = RecordingWriter::default();
        let inbound = InboundStream::new(RequestReader(request), handler.inbound_buffer_size());
        let (outbound, driver) = OutboundWriter::new(recording.clone());

        tokio::join!(handler.handle(inbound, outbound), driver.run());

        let writes = recording.writes.lock().unwrap().clone();
        writes
    }

    #[tokio::test]
    async fn head_and_file_start_share_the_first_write() {
        let dir = tempfile::tempdir().unwrap();
        let content = (0..=255u8).cycle().take(1000).collect::<Vec<_>>();
        let mut file = File::create(dir.path().join("data.bin")).await.unwrap();
        file.write_all(&content).await.unwrap();
        file.sync_all().await.unwrap();

        let config = FileHandlerConfig::new().with_output_buffer_size(256);
        let handler = FileStreamHandler::with_config(Arc::new(DirectoryProvider::new(dir.path())), config);

        let writes = run(handler, b"GET /data.bin HTTP/1.1\r\n\r\n").await;

        assert!(writes.iter().all(|write| write.len() <= 256));

        let first = String::from_utf8_lossy(&writes[0]);
        assert!(first.starts_with("HTTP/1.1 200 OK\r\n"), "{first}");
        assert!(first.contains("content-type: application/octet-stream\r\n"), "{first}");
        assert!(first.contains("content-length: 1000\r\n"), "{first}");

        let all = writes.concat();
        let body_start = all.windows(4).position(|window| window == b"\r\n\r\n").unwrap() + 4;
        assert!(body_start < writes[0].len(), "first write carries file content");
        assert_eq!(&all[body_start..], &content[..]);
    }

    #[tokio::test]
    async fn body_is_capped_at_the_announced_size() {
        let recording = RecordingWriter::default();
        let (outbound, driver) = OutboundWriter::new(recording.clone());
        let head = ResponseHead::ok().content_length(10);

        // the file grew to 26 bytes after its size was taken
        let file: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
        let send_and_finish = async {
            let sent = send(&outbound, &head, file, 10, 8).await;
            outbound.finish();
            sent
        };
        let (sent, ()) = tokio::join!(send_and_finish, driver.run());

        assert_eq!(sent.unwrap(), 10);
        let all = recording.writes.lock().unwrap().concat();
        assert!(all.ends_with(b"\r\n\r\nabcdefghij"), "{}", String::from_utf8_lossy(&all));
    }

    #[tokio::test]
    async fn shrunken_file_sends_what_is_left() {
        let recording = RecordingWriter::default();
        let (outbound, driver) = OutboundWriter::new(recording.clone());
        let head = ResponseHead::ok().content_length(10);

        let file: &[u8] = b"abcd";
        let send_and_finish = async {
            let sent = send(&outbound, &head, file, 10, 8).await;
            outbound.finish();
            sent
        };
        let (sent, ()) = tokio::join!(send_and_finish, driver.run());

        assert_eq!(sent.unwrap(), 4);
        assert!(recording.writes.lock().unwrap().concat().ends_with(b"\r\n\r\nabcd"));
    }

    #[tokio::test]
    async fn missing_file_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let handler = FileStreamHandler::new(Arc::new(DirectoryProvider::new(dir.path())));

        let writes = run(handler, b"GET /missing.txt HTTP/1.1\r\n\r\n").await;

        let response = String::from_utf8(writes.concat()).unwrap();
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"), "{response}");
        assert!(response.ends_with("content-length: 0\r\n\r\n"), "{response}");
    }

    #[tokio::test]
    async fn incomplete_request_gets_no_response() {
        let dir = tempfile::tempdir().unwrap();
        let handler = FileStreamHandler::new(Arc::new(DirectoryProvider::new(dir.path())));

        let writes = run(handler, b"GET /index.html HTTP/1.1\r\nHost").await;
        assert!(writes.is_empty());
    }
}
