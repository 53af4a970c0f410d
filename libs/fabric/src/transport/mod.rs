use crate::error::Result;

pub mod endpoint;
mod framing;
pub mod tcp;
pub mod unix;

pub use self::endpoint::{Endpoint, EndpointListener};
pub use self::framing::MAX_FRAME_SIZE;
pub use self::tcp::{TcpTransport, TcpTransportBuilder, TcpTransportListener};
pub use self::unix::{UnixTransport, UnixTransportBuilder, UnixTransportListener};

/// Transport trait for sending and receiving raw frames
///
/// Each transport instance represents a single connection.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send one frame over the transport
    async fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Receive one frame from the transport
    async fn receive(&mut self) -> Result<Vec<u8>>;

    /// Close the transport connection
    async fn close(&mut self) -> Result<()>;
}

/// Listener trait for accepting incoming transports
#[async_trait::async_trait]
pub trait TransportListener: Send + Sync {
    type Transport: Transport;

    /// Wait for the next incoming connection
    async fn accept(&self) -> Result<Self::Transport>;

    /// Stop listening
    async fn close(&mut self) -> Result<()>;
}
