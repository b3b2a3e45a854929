use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tracing::trace;

use crate::codec::HeaderParser;
use crate::ensure;
use crate::protocol::{ParseError, Request, RequestError, TransportError};

const SUPPORTED_PROTOCOL_PREFIX: &str = "HTTP";

/// Reads one request from `inbound`: the header through `parser`, then a body
/// of `Content-Length` bytes (none when the header is absent).
///
/// The stream is not polled once the body is complete. Bytes past the declared
/// length that arrived in the same chunk are dropped.
///
/// # Errors
///
/// - [`ParseError::HeaderIncomplete`] if the stream ends before the header is complete
/// - [`ParseError::NotSupportedProtocol`] if the protocol token does not start with `HTTP`
/// - any other [`ParseError`] reported by the parser
/// - [`TransportError::ClosedUnexpectedly`] if the stream ends inside the body,
///   or the read error yielded by the stream
pub async fn read_request<S>(inbound: &mut S, mut parser: HeaderParser) -> Result<Request, RequestError>
where
    S: Stream<Item = Result<Bytes, TransportError>> + Unpin,
{
    let mut body = BytesMut::new();

    while !parser.is_ready() {
        let Some(chunk) = inbound.next().await else {
            trace!(buffered = parser.buffered(), "stream finished before header was complete");
            return Err(ParseError::HeaderIncomplete.into());
        };
        parser.parse(&chunk?, &mut body)?;
    }

    let Some(header) = parser.into_header() else {
        return Err(ParseError::HeaderIncomplete.into());
    };

    ensure!(header.protocol().starts_with(SUPPORTED_PROTOCOL_PREFIX), ParseError::not_supported_protocol(header.protocol()).into());

    let content_length = header.content_length()?;
    let content_length = usize::try_from(content_length)
        .map_err(|_| ParseError::invalid_content_length(format!("value {content_length} exceeds the addressable size")))?;

    while body.len() < content_length {
        let Some(chunk) = inbound.next().await else {
            trace!(received = body.len(), content_length, "stream finished inside the body");
            return Err(TransportError::ClosedUnexpectedly.into());
        };
        body.extend_from_slice(&chunk?);
    }

    if body.len() > content_length {
        trace!(dropped = body.len() - content_length, "drop bytes past content-length");
        body.truncate(content_length);
    }

    Ok(Request::new(header, body.freeze()))
}
