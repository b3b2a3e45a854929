//! Static file serving for micro-serve
//!
//! [`FileStreamHandler`] is a [`ConnectionHandler`](micro_serve::handler::ConnectionHandler)
//! that reads one request, asks a [`FileProvider`] for the file to send and
//! streams it back with a `200 OK` head. [`DirectoryProvider`] serves the files
//! below a root directory.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use micro_files::{DirectoryProvider, FileHandlerConfig, FileStreamHandler};
//! use micro_serve::address::InternetAddress;
//! use micro_serve::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = Arc::new(DirectoryProvider::new("./public"));
//!     let config = FileHandlerConfig::new().with_output_buffer_size(64 * 1024);
//!
//!     let mut server = Server::new(move || FileStreamHandler::with_config(Arc::clone(&provider), config));
//!     server.start(InternetAddress::loopback(), 8080)?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     server.shutdown();
//!     Ok(())
//! }
//! ```

mod config;
mod content_type;
mod error;
mod handler;
mod provider;

pub use config::DEFAULT_OUTPUT_BUFFER_SIZE;
pub use config::FileHandlerConfig;
pub use content_type::mime_for_path;
pub use error::FileError;
pub use handler::FileStreamHandler;
pub use provider::DirectoryProvider;
pub use provider::FileProvider;
pub use provider::INDEX_FILE;
pub use provider::ProviderFn;
pub use provider::provider_fn;
