use std::io;
use std::path::PathBuf;

use http::StatusCode;
use micro_serve::protocol::{RequestError, WriteError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("file {path:?} not found")]
    NotFound { path: PathBuf },

    #[error("request path {path:?} leaves the served directory")]
    InvalidPath { path: String },

    #[error("failed to open {path:?}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("failed to read file: {source}")]
    Read { source: io::Error },

    #[error("failed to write response: {source}")]
    Write {
        #[from]
        source: WriteError,
    },
}

impl FileError {
    pub fn not_found<P: Into<PathBuf>>(path: P) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn invalid_path<S: ToString>(path: S) -> Self {
        Self::InvalidPath { path: path.to_string() }
    }

    /// The status of the error response, `None` when the connection is closed without one.
    ///
    /// Read and write failures happen while the response is already on the
    /// wire, so no error head can follow.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Request(e) => e.status(),
            Self::NotFound { .. } | Self::InvalidPath { .. } => Some(StatusCode::NOT_FOUND),
            Self::Open { .. } => Some(StatusCode::INTERNAL_SERVER_ERROR),
            Self::Read { .. } | Self::Write { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use micro_serve::protocol::ParseError;

    #[test]
    fn status_mapping() {
        assert_eq!(FileError::not_found("/missing").status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(FileError::invalid_path("/../etc/passwd").status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(
            FileError::Open { path: "/locked".into(), source: io::ErrorKind::PermissionDenied.into() }.status(),
            Some(StatusCode::INTERNAL_SERVER_ERROR)
        );
        assert_eq!(FileError::from(RequestError::from(ParseError::HeaderIncomplete)).status(), None);
        assert_eq!(FileError::from(RequestError::from(ParseError::invalid_request_line("GET"))).status(), Some(StatusCode::BAD_REQUEST));
        assert_eq!(FileError::from(WriteError::Finished).status(), None);
    }
}
