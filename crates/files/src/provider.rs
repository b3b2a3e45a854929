//! Mapping a request to the file that answers it.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use micro_serve::protocol::Request;
use tracing::trace;

use crate::FileError;

/// Default file served for a directory path.
pub const INDEX_FILE: &str = "index.html";

#[async_trait]
pub trait FileProvider: Send + Sync + 'static {
    /// The path of the file to send for `request`.
    ///
    /// The returned path does not need to exist, a missing file is answered
    /// with `404 Not Found`.
    async fn resolve(&self, request: &Request) -> Result<PathBuf, FileError>;
}

/// Serves the files below a root directory.
///
/// The request path is split on `/`; empty and `.` segments are skipped and a
/// `..` segment rejects the request. A path ending in `/` is answered with the
/// index file of that directory. Query and fragment are ignored.
#[derive(Debug, Clone)]
pub struct DirectoryProvider {
    root: PathBuf,
    index_file: String,
}

impl DirectoryProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), index_file: INDEX_FILE.to_owned() }
    }

    #[must_use]
    pub fn with_index_file(mut self, index_file: impl Into<String>) -> Self {
        self.index_file = index_file.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a request path to a path below the root.
    ///
    /// # Errors
    ///
    /// [`FileError::InvalidPath`] if a segment is `..` or contains a backslash
    /// or a NUL byte.
    pub fn resolve_path(&self, request_path: &str) -> Result<PathBuf, FileError> {
        let path = request_path.split(['?', '#']).next().unwrap_or_default();

        let mut resolved = self.root.clone();
        for segment in path.split('/').filter(|segment| !segment.is_empty() && *segment != ".") {
            if segment == ".." || segment.contains(['\\', '\0']) {
                return Err(FileError::invalid_path(request_path));
            }
            resolved.push(segment);
        }

        if path.is_empty() || path.ends_with('/') {
            resolved.push(&self.index_file);
        }

        trace!(request_path, resolved = %resolved.display(), "resolved request path");
        Ok(resolved)
    }
}

#[async_trait]
impl FileProvider for DirectoryProvider {
    async fn resolve(&self, request: &Request) -> Result<PathBuf, FileError> {
        self.resolve_path(request.header().path())
    }
}

/// A [`FileProvider`] backed by an async function, see [`provider_fn`].
pub struct ProviderFn<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> FileProvider for ProviderFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<PathBuf, FileError>> + Send,
{
    async fn resolve(&self, request: &Request) -> Result<PathBuf, FileError> {
        (self.f)(request.clone()).await
    }
}

impl<F> fmt::Debug for ProviderFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderFn").finish_non_exhaustive()
    }
}

/// Builds a [`FileProvider`] from an async function of the request.
pub fn provider_fn<F, Fut>(f: F) -> ProviderFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<PathBuf, FileError>> + Send,
{
    ProviderFn { f }
}
