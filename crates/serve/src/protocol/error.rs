use std::io;
use std::net::SocketAddr;

use http::StatusCode;
use thiserror::Error;

use crate::protocol::request_header_too_large;

/// The textual form of an ip address could not be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("the provided value `{value}` is not a valid ipv4 or ipv6 address")]
    InvalidAddress { value: String },
}

impl AddressError {
    pub fn invalid_address<S: ToString>(value: S) -> Self {
        Self::InvalidAddress { value: value.to_string() }
    }
}

/// Creating the listening socket failed, surfaced synchronously from `start`.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("failed to create socket for {endpoint}: {source}")]
    Socket { endpoint: SocketAddr, source: io::Error },

    #[error("failed to bind {endpoint}: {source}")]
    Bind { endpoint: SocketAddr, source: io::Error },

    #[error("failed to listen on {endpoint}: {source}")]
    Listen { endpoint: SocketAddr, source: io::Error },
}

impl BindError {
    /// The underlying io error, e.g. `AddrInUse`.
    pub fn io_error(&self) -> &io::Error {
        match self {
            Self::Socket { source, .. } | Self::Bind { source, .. } | Self::Listen { source, .. } => source,
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ListenerError {
    #[error("the accept stream of this listener has already been taken")]
    AlreadyConsumed,

    #[error("the listener has been stopped")]
    Stopped,
}

/// Read or write failure on an established connection.
///
/// These errors stay local to the connection they happened on.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("read error: {source}")]
    Read { source: io::Error },

    #[error("write error: {source}")]
    Write { source: io::Error },

    #[error("transport closed unexpectedly")]
    ClosedUnexpectedly,

    #[error("transport operation cancelled")]
    Cancelled,
}

impl TransportError {
    pub fn read<E: Into<io::Error>>(e: E) -> Self {
        Self::Read { source: e.into() }
    }

    pub fn write<E: Into<io::Error>>(e: E) -> Self {
        Self::Write { source: e.into() }
    }
}

/// The outcome of a failed [`OutboundWriter::write`](crate::transport::OutboundWriter::write).
#[derive(Debug, Error)]
pub enum WriteError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("another write is still pending on this writer")]
    ConcurrentWriteViolation,

    #[error("writer has already been finished")]
    Finished,
}

impl WriteError {
    /// Usage errors point at a defect in the caller rather than at the peer.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, Self::ConcurrentWriteViolation | Self::Finished)
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    HeaderTooLarge { current_size: usize, max_size: usize },

    #[error("not a valid request line: {line:?}")]
    NotValidRequestLine { line: String },

    #[error("stream finished before the request header was complete")]
    HeaderIncomplete,

    #[error("protocol {protocol:?} is not supported")]
    NotSupportedProtocol { protocol: String },

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::HeaderTooLarge { current_size, max_size }
    }

    pub fn invalid_request_line<S: ToString>(line: S) -> Self {
        Self::NotValidRequestLine { line: line.to_string() }
    }

    pub fn not_supported_protocol<S: ToString>(protocol: S) -> Self {
        Self::NotSupportedProtocol { protocol: protocol.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    /// The status of the best-effort response for this error.
    ///
    /// `None` means the connection is closed without a response.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::HeaderTooLarge { .. } => Some(request_header_too_large()),
            Self::NotValidRequestLine { .. } | Self::InvalidContentLength { .. } => Some(StatusCode::BAD_REQUEST),
            Self::NotSupportedProtocol { .. } => Some(StatusCode::HTTP_VERSION_NOT_SUPPORTED),
            Self::HeaderIncomplete => None,
        }
    }
}

/// Failure while reading a request from an inbound stream.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request error: {source}")]
    Parse {
        #[from]
        source: ParseError,
    },

    #[error("transport error: {source}")]
    Transport {
        #[from]
        source: TransportError,
    },
}

impl RequestError {
    /// The status of the best-effort response, `None` when nothing should be sent.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Parse { source } => source.status(),
            Self::Transport { .. } => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("server is already running")]
    AlreadyRunning,

    #[error("bind error: {source}")]
    Bind {
        #[from]
        source: BindError,
    },

    #[error("listener error: {source}")]
    Listener {
        #[from]
        source: ListenerError,
    },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerBuildError {
    #[error("handler factory must be set")]
    MissingHandlerFactory,
}
