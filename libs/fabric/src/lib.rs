//! Pushbus Fabric - Low-level transport and codec layer
//!
//! Provides length-framed transports (TCP, Unix sockets), connection-string
//! parsing and a bincode codec for the push message bus.
//!
//! # Example
//!
//! ```no_run
//! use pushbus_fabric::{Endpoint, Transport, codec::{BincodeCodec, Codec}};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let endpoint: Endpoint = "tcp://127.0.0.1:49853".parse()?;
//! let mut transport = endpoint.connect(None).await?;
//!
//! let frame = BincodeCodec.encode(&("hello".to_string(), 42u32))?;
//! transport.send(&frame).await?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod error;
pub mod transport;

// Re-exports for convenience
pub use error::{Error, Result};
pub use transport::{Endpoint, EndpointListener, Transport};
