//! Response head serialization.
//!
//! Handlers stream the response themselves through an
//! [`OutboundWriter`](crate::transport::OutboundWriter); this module only
//! produces the status line and header block that precede the body.

use std::io;
use std::io::Write;

use bytes::{BufMut, Bytes, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};

use crate::protocol::reason_phrase;

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 512;

/// Value of the `Server` header written by [`error_response`].
pub const SERVER_NAME: &str = "micro-serve";

/// Status line and headers of an HTTP/1.1 response.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    status: StatusCode,
    headers: HeaderMap,
}

impl ResponseHead {
    pub fn new(status: StatusCode) -> Self {
        Self { status, headers: HeaderMap::new() }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Sets `name`, replacing any previous value.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// The body must be exactly `length` bytes, chunked encoding is not supported.
    #[must_use]
    pub fn content_length(self, length: u64) -> Self {
        self.header(header::CONTENT_LENGTH, HeaderValue::from(length))
    }

    /// Writes `HTTP/1.1 <code> <reason>\r\n`, every header as `key: value\r\n` and the blank line.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(INIT_HEADER_SIZE);
        // writing into BytesMut can't fail
        let _ = write!(FastWrite(dst), "HTTP/1.1 {} {}\r\n", self.status.as_str(), reason_phrase(self.status));

        for (header_name, header_value) in &self.headers {
            dst.put_slice(header_name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(header_value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut dst = BytesMut::new();
        self.encode(&mut dst);
        dst.freeze()
    }
}

/// The head of a best-effort error response: minimal headers and an empty body.
pub fn error_response(status: StatusCode) -> ResponseHead {
    let mut head = ResponseHead::new(status)
        .header(header::SERVER, HeaderValue::from_static(SERVER_NAME))
        .header(header::CONNECTION, HeaderValue::from_static("close"));

    let mut date = faf_http_date::get_date_buff_no_key();
    faf_http_date::get_date_no_key(&mut date);
    if let Ok(value) = HeaderValue::from_bytes(&date) {
        head.headers_mut().insert(header::DATE, value);
    }

    head.header(header::CONTENT_TYPE, HeaderValue::from_static("text/html;charset=utf-8")).content_length(0)
}

/// Adapter to use `write!` on a `BytesMut`.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
