//! Parsed request head and the request assembled from it.
//!
//! The header block grammar accepted here is deliberately permissive:
//!
//! - the request line must split on single spaces into exactly three tokens
//!   (`<METHOD> <PATH> <PROTOCOL>`), anything else is rejected
//! - every other line is split on its first `": "`; lines without that
//!   separator, or with a name/value that is not a valid header, are skipped
//! - when a header name repeats, the first occurrence wins

use bytes::Bytes;
use http::header::Entry;
use http::{HeaderMap, HeaderName, HeaderValue, Method, header};
use tracing::trace;

use crate::ensure;
use crate::protocol::ParseError;

const LINE_SEPARATOR: &str = "\r\n";
const REQUEST_LINE_SEPARATOR: char = ' ';
const HEADER_KEY_VALUE_SEPARATOR: &str = ": ";

/// Request line and header fields of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeaderInfo {
    method: Method,
    path: String,
    protocol: String,
    headers: HeaderMap,
}

impl RequestHeaderInfo {
    /// Parses a header block, i.e. everything before the `\r\n\r\n` delimiter.
    pub fn parse(block: &[u8]) -> Result<Self, ParseError> {
        let text = String::from_utf8_lossy(block);
        let mut lines = text.split(LINE_SEPARATOR);

        let request_line = lines.next().unwrap_or_default();
        let tokens = request_line.split(REQUEST_LINE_SEPARATOR).collect::<Vec<_>>();
        ensure!(tokens.len() == 3, ParseError::invalid_request_line(request_line));

        let method = Method::from_bytes(tokens[0].as_bytes()).map_err(|_| ParseError::invalid_request_line(request_line))?;
        let path = tokens[1].to_owned();
        let protocol = tokens[2].to_owned();

        let mut headers = HeaderMap::new();
        for line in lines {
            let Some((name, value)) = line.split_once(HEADER_KEY_VALUE_SEPARATOR) else {
                trace!(line, "skip header line without separator");
                continue;
            };

            let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) else {
                trace!(line, "skip invalid header line");
                continue;
            };

            match headers.entry(name) {
                Entry::Vacant(entry) => {
                    entry.insert(value);
                }
                Entry::Occupied(entry) => {
                    trace!(header = %entry.key(), "ignore duplicate header");
                }
            }
        }

        Ok(Self { method, path, protocol, headers })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Looks up a header value as text, names are case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// The declared body length, zero when the header is absent.
    pub fn content_length(&self) -> Result<u64, ParseError> {
        let Some(value) = self.headers.get(header::CONTENT_LENGTH) else {
            return Ok(0);
        };

        let str = value.to_str().map_err(|_| ParseError::invalid_content_length("value can't to_str"))?;
        str.trim().parse::<u64>().map_err(|_| ParseError::invalid_content_length(format!("value {str} is not u64")))
    }
}

/// A request head together with its (fully read) body.
#[derive(Debug, Clone)]
pub struct Request {
    header: RequestHeaderInfo,
    body: Bytes,
}

impl Request {
    pub fn new(header: RequestHeaderInfo, body: Bytes) -> Self {
        Self { header, body }
    }

    pub fn header(&self) -> &RequestHeaderInfo {
        &self.header
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_parts(self) -> (RequestHeaderInfo, Bytes) {
        (self.header, self.body)
    }
}
