//! Incremental request header parser.
//!
//! Bytes are accumulated until the `\r\n\r\n` delimiter shows up, then the
//! header block is parsed into a [`RequestHeaderInfo`]. Only the newly
//! appended bytes (plus the last three bytes of the previous scan, in case
//! the delimiter straddles two chunks) are searched on every call.
//!
//! # Limits
//!
//! - the header block, delimiter excluded, must not exceed the configured
//!   maximum ([`DEFAULT_MAX_HEADER_SIZE`] unless set otherwise)
//! - while the delimiter has not been seen, the buffered bytes, minus the
//!   three that may start a split delimiter, must not exceed the same maximum,
//!   so the outcome does not depend on how the input was chunked

use bytes::BytesMut;
use tracing::trace;

use crate::ensure;
use crate::protocol::{ParseError, RequestHeaderInfo};

/// Maximum size in bytes of the header block.
pub const DEFAULT_MAX_HEADER_SIZE: usize = 8 * 1024;

const HEADER_DELIMITER: &[u8] = b"\r\n\r\n";

#[derive(Debug)]
pub enum HeaderParseState {
    NeedMoreData { buffered: BytesMut },
    Ready(RequestHeaderInfo),
}

/// Accumulates chunks until a complete header block was received.
///
/// The state only moves forward: once [`HeaderParseState::Ready`], further
/// input is ignored.
#[derive(Debug)]
pub struct HeaderParser {
    max_size: usize,
    scanned: usize,
    state: HeaderParseState,
}

impl HeaderParser {
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_HEADER_SIZE)
    }

    pub fn with_max_size(max_size: usize) -> Self {
        Self { max_size, scanned: 0, state: HeaderParseState::NeedMoreData { buffered: BytesMut::new() } }
    }

    /// Feeds one chunk into the parser.
    ///
    /// When the chunk completes the header, the bytes following the delimiter
    /// are appended to `body`.
    ///
    /// # Errors
    ///
    /// - [`ParseError::HeaderTooLarge`] if the header block exceeds the maximum
    ///   size, or is already known to exceed it while waiting for the delimiter
    /// - [`ParseError::NotValidRequestLine`] if the request line is malformed
    pub fn parse(&mut self, chunk: &[u8], body: &mut BytesMut) -> Result<(), ParseError> {
        let HeaderParseState::NeedMoreData { buffered } = &mut self.state else {
            trace!(chunk_size = chunk.len(), "header already parsed, ignore chunk");
            return Ok(());
        };

        let search_from = self.scanned.saturating_sub(HEADER_DELIMITER.len() - 1);
        buffered.extend_from_slice(chunk);

        let Some(position) = find_delimiter(&buffered[search_from..]) else {
            self.scanned = buffered.len();
            trace!(buffered = buffered.len(), "header delimiter not found yet");
            // the tail may be the start of a split delimiter, it never counts toward the block
            let header_size = buffered.len().saturating_sub(HEADER_DELIMITER.len() - 1);
            ensure!(header_size <= self.max_size, ParseError::too_large_header(header_size, self.max_size));
            return Ok(());
        };

        let header_size = search_from + position;
        trace!(header_size, "found header delimiter");
        ensure!(header_size <= self.max_size, ParseError::too_large_header(header_size, self.max_size));

        let mut block = buffered.split_to(header_size + HEADER_DELIMITER.len());
        block.truncate(header_size);
        body.extend_from_slice(&buffered[..]);

        let header = RequestHeaderInfo::parse(&block[..])?;
        self.state = HeaderParseState::Ready(header);
        Ok(())
    }

    pub fn state(&self) -> &HeaderParseState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, HeaderParseState::Ready(_))
    }

    pub fn header(&self) -> Option<&RequestHeaderInfo> {
        match &self.state {
            HeaderParseState::Ready(header) => Some(header),
            HeaderParseState::NeedMoreData { .. } => None,
        }
    }

    pub fn into_header(self) -> Option<RequestHeaderInfo> {
        match self.state {
            HeaderParseState::Ready(header) => Some(header),
            HeaderParseState::NeedMoreData { .. } => None,
        }
    }

    /// Number of bytes held while waiting for the delimiter.
    pub fn buffered(&self) -> usize {
        match &self.state {
            HeaderParseState::NeedMoreData { buffered } => buffered.len(),
            HeaderParseState::Ready(_) => 0,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

impl Default for HeaderParser {
    fn default() -> Self {
        Self::new()
    }
}

fn find_delimiter(bytes: &[u8]) -> Option<usize> {
    bytes.windows(HEADER_DELIMITER.len()).position(|window| window == HEADER_DELIMITER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use indoc::indoc;

    fn crlf(str: &str) -> String {
        str.replace('\n', "\r\n")
    }

    fn curl_request() -> String {
        crlf(indoc! {r##"
        GET /index.html HTTP/1.1
        Host: 127.0.0.1:8080
        User-Agent: curl/7.79.1
        Accept: */*

        BODY"##})
    }

    #[test]
    fn from_curl() {
        let request = curl_request();
        let mut parser = HeaderParser::new();
        let mut body = BytesMut::new();

        parser.parse(request.as_bytes(), &mut body).unwrap();

        assert!(parser.is_ready());
        assert_eq!(parser.buffered(), 0);
        assert_eq!(&body[..], b"BODY");

        let header = parser.into_header().unwrap();
        assert_eq!(header.method(), &Method::GET);
        assert_eq!(header.path(), "/index.html");
        assert_eq!(header.protocol(), "HTTP/1.1");
        assert_eq!(header.headers().len(), 3);
        assert_eq!(header.header("user-agent"), Some("curl/7.79.1"));
    }

    #[test]
    fn every_split_point_gives_the_same_result() {
        let request = curl_request();
        let bytes = request.as_bytes();

        let mut whole = HeaderParser::new();
        let mut expected_body = BytesMut::new();
        whole.parse(bytes, &mut expected_body).unwrap();
        let expected = whole.into_header().unwrap();

        for split in 0..=bytes.len() {
            let mut parser = HeaderParser::new();
            let mut body = BytesMut::new();

            parser.parse(&bytes[..split], &mut body).unwrap();
            if parser.is_ready() {
                body.extend_from_slice(&bytes[split..]);
            } else {
                parser.parse(&bytes[split..], &mut body).unwrap();
            }

            assert_eq!(parser.header(), Some(&expected), "split at {split}");
            assert_eq!(body, expected_body, "split at {split}");
        }
    }

    fn parse_split(bytes: &[u8], split: usize, max_size: usize) -> Result<HeaderParser, ParseError> {
        let mut parser = HeaderParser::with_max_size(max_size);
        let mut body = BytesMut::new();
        parser.parse(&bytes[..split], &mut body)?;
        parser.parse(&bytes[split..], &mut body)?;
        Ok(parser)
    }

    #[test]
    fn header_at_the_limit_is_accepted_at_every_split_point() {
        let request = b"GET /abcdefghijkl HTTP/1.1\r\nA: b\r\n\r\n";
        let header_size = request.len() - HEADER_DELIMITER.len();
        assert_eq!(header_size, 32);

        for split in 0..=request.len() {
            let parser = parse_split(request, split, header_size).unwrap();
            assert!(parser.is_ready(), "split at {split}");
            assert_eq!(parser.header().map(RequestHeaderInfo::path), Some("/abcdefghijkl"), "split at {split}");
        }
    }

    #[test]
    fn header_over_the_limit_is_rejected_at_every_split_point() {
        let request = b"GET /abcdefghijkl HTTP/1.1\r\nA: bc\r\n\r\n";
        let header_size = request.len() - HEADER_DELIMITER.len();

        for split in 0..=request.len() {
            let result = parse_split(request, split, header_size - 1);
            assert!(matches!(result, Err(ParseError::HeaderTooLarge { max_size: 32, .. })), "split at {split}");
        }
    }

    #[test]
    fn byte_by_byte() {
        let request = curl_request();
        let mut parser = HeaderParser::new();
        let mut body = BytesMut::new();

        for byte in request.as_bytes() {
            if parser.is_ready() {
                body.extend_from_slice(std::slice::from_ref(byte));
            } else {
                parser.parse(std::slice::from_ref(byte), &mut body).unwrap();
            }
        }

        assert!(parser.is_ready());
        assert_eq!(&body[..], b"BODY");
    }

    #[test]
    fn need_more_data() {
        let mut parser = HeaderParser::new();
        let mut body = BytesMut::new();

        parser.parse(b"GET / HTTP/1.1\r\nHost: a\r\n", &mut body).unwrap();

        assert!(!parser.is_ready());
        assert!(matches!(parser.state(), HeaderParseState::NeedMoreData { .. }));
        assert_eq!(parser.buffered(), 25);
        assert!(parser.header().is_none());
        assert!(body.is_empty());
    }

    #[test]
    fn header_too_large_without_delimiter() {
        let mut parser = HeaderParser::new();
        let mut body = BytesMut::new();

        let filler = vec![b'a'; 4096];
        parser.parse(&filler, &mut body).unwrap();
        parser.parse(&filler, &mut body).unwrap();
        parser.parse(b"aaa", &mut body).unwrap();

        match parser.parse(b"a", &mut body) {
            Err(ParseError::HeaderTooLarge { current_size, max_size }) => {
                assert_eq!(current_size, 8193);
                assert_eq!(max_size, DEFAULT_MAX_HEADER_SIZE);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn header_too_large_with_delimiter() {
        let mut parser = HeaderParser::with_max_size(32);
        let mut body = BytesMut::new();

        let request = crlf(indoc! {r##"
        GET /a/very/long/path/that/does/not/fit HTTP/1.1
        Host: 127.0.0.1

        "##});

        let result = parser.parse(request.as_bytes(), &mut body);
        assert!(matches!(result, Err(ParseError::HeaderTooLarge { max_size: 32, .. })));
    }

    #[test]
    fn large_body_in_first_chunk_is_not_counted() {
        let mut parser = HeaderParser::with_max_size(64);
        let mut body = BytesMut::new();

        let mut request = b"POST /upload HTTP/1.1\r\nContent-Length: 1000\r\n\r\n".to_vec();
        request.extend_from_slice(&[b'x'; 1000]);

        parser.parse(&request, &mut body).unwrap();

        assert!(parser.is_ready());
        assert_eq!(body.len(), 1000);
    }

    #[test]
    fn invalid_request_line() {
        let mut parser = HeaderParser::new();
        let mut body = BytesMut::new();

        let result = parser.parse(b"GET /\r\nHost: a\r\n\r\n", &mut body);
        assert!(matches!(result, Err(ParseError::NotValidRequestLine { .. })));
    }

    #[test]
    fn input_after_ready_is_ignored() {
        let mut parser = HeaderParser::new();
        let mut body = BytesMut::new();

        parser.parse(b"GET / HTTP/1.1\r\n\r\n", &mut body).unwrap();
        assert!(parser.is_ready());

        parser.parse(b"GET /other HTTP/1.1\r\n\r\nmore", &mut body).unwrap();

        assert_eq!(parser.header().unwrap().path(), "/");
        assert!(body.is_empty());
    }
}
