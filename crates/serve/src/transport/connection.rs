use std::io;
use std::net::SocketAddr;

use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

/// One accepted transport.
///
/// The connection is split into its read and write sides, which are then
/// owned by an [`InboundStream`](super::InboundStream) and an
/// [`OutboundWriter`](super::OutboundWriter). The socket is closed once both
/// sides are dropped.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    peer_addr: SocketAddr,
}

impl Connection {
    pub fn new(stream: TcpStream, peer_addr: SocketAddr) -> Self {
        Self { stream, peer_addr }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.stream.local_addr()
    }

    pub fn into_split(self) -> (OwnedReadHalf, OwnedWriteHalf) {
        self.stream.into_split()
    }

    pub fn into_inner(self) -> TcpStream {
        self.stream
    }
}
