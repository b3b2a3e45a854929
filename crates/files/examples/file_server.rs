//! Serves a directory over HTTP.
//!
//! ```text
//! cargo run -p micro-files --example file_server -- [address] [port] [root]
//! ```
//!
//! Defaults to `127.0.0.1 8080 .`.

use std::sync::Arc;

use micro_files::{DirectoryProvider, FileHandlerConfig, FileStreamHandler};
use micro_serve::address::InternetAddress;
use micro_serve::server::Server;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let mut args = std::env::args().skip(1);
    let address = args.next().unwrap_or_else(|| InternetAddress::LOOPBACK.to_owned());
    let port = args.next().unwrap_or_else(|| "8080".to_owned());
    let root = args.next().unwrap_or_else(|| ".".to_owned());

    let address = match address.parse::<InternetAddress>() {
        Ok(address) => address,
        Err(e) => {
            error!(cause = %e, "invalid address");
            return;
        }
    };

    let port = match port.parse::<u16>() {
        Ok(port) => port,
        Err(e) => {
            error!(cause = %e, %port, "invalid port");
            return;
        }
    };

    let provider = Arc::new(DirectoryProvider::new(root));
    let config = FileHandlerConfig::default();
    let mut server = Server::builder()
        .handler_factory(move || FileStreamHandler::with_config(Arc::clone(&provider), config))
        .on_accept_error(|e| error!(cause = %e, "accept failed"))
        .build()
        .expect("handler factory is set");

    match server.start(address, port) {
        Ok(local_addr) => info!(%local_addr, "file server started"),
        Err(e) => {
            error!(cause = %e, "failed to start file server");
            return;
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(cause = %e, "failed to listen for ctrl-c");
    }

    info!("shutting down");
    server.shutdown();
}
