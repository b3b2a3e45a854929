//! Protocol types shared by the transport, codec and handler layers.
//!
//! - [`RequestHeaderInfo`] / [`Request`]: the parsed request head and the request body
//! - [`ResponseHead`]: status line and headers written in front of a response body
//! - [`reason_phrase`]: reason phrases, including non-standard codes such as 494
//! - error types for every layer, see the crate level documentation for the taxonomy

mod error;
pub use error::AddressError;
pub use error::BindError;
pub use error::ListenerError;
pub use error::ParseError;
pub use error::RequestError;
pub use error::ServerBuildError;
pub use error::ServerError;
pub use error::TransportError;
pub use error::WriteError;

mod request;
pub use request::Request;
pub use request::RequestHeaderInfo;

mod response;
pub use response::ResponseHead;
pub use response::SERVER_NAME;
pub use response::error_response;

mod status;
pub use status::reason_phrase;
pub use status::request_header_too_large;
