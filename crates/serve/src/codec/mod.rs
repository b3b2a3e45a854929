//! Request decoding on top of an inbound chunk stream.
//!
//! [`HeaderParser`] is the incremental, bounded header state machine and
//! [`read_request`] drives it (and the body that follows) from any stream of
//! chunks, typically an [`InboundStream`](crate::transport::InboundStream).

mod header_parser;
mod request_reader;

pub use header_parser::DEFAULT_MAX_HEADER_SIZE;
pub use header_parser::HeaderParseState;
pub use header_parser::HeaderParser;
pub use request_reader::read_request;
