//! Reason phrases for status codes.
//!
//! Standard codes use the reason phrases shipped with the `http` crate. A few
//! non-standard codes used by proxies and servers in the wild are kept in a
//! static table, most notably `494 Request Header Too Large` which is returned
//! when a request header exceeds the parser limit.

use http::StatusCode;

static EXTENDED_REASONS: &[(u16, &str)] = &[
    (306, "Switch Proxy"),
    (419, "Authentication Timeout"),
    (440, "Login Timeout"),
    (444, "No Response"),
    (449, "Retry With"),
    (494, "Request Header Too Large"),
    (495, "Cert Error"),
    (496, "No Cert"),
    (497, "HTTP To HTTPS"),
    (498, "Token Expired"),
    (499, "Client Closed Request"),
    (509, "Bandwidth Limit Exceeded"),
    (599, "Network Timeout Error"),
];

/// Status sent when the request header exceeds the configured maximum.
pub fn request_header_too_large() -> StatusCode {
    StatusCode::from_u16(494).unwrap_or(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE)
}

/// Returns the reason phrase written on the status line for `status`.
pub fn reason_phrase(status: StatusCode) -> &'static str {
    if let Some(reason) = status.canonical_reason() {
        return reason;
    }

    let code = status.as_u16();
    EXTENDED_REASONS
        .iter()
        .find_map(|(candidate, reason)| (*candidate == code).then_some(*reason))
        .unwrap_or("Unknown")
}
