//! Socket transport for the AGDirect protocol.
//!
//! This is the lowest layer of agdirect:
//! - [`LinkStream`] wraps the connected socket (TCP, or a Unix socket pair in tests)
//! - [`tcp`] opens client connections with polling and binds test listeners
//! - [`Port`] buffers outbound bytes until an explicit flush
//! - [`Traced`] logs raw reads and writes when byte tracing is enabled
//!
//! Everything above it only sees `Read + Write`.

pub mod error;
pub mod port;
pub mod stream;
pub mod tcp;
pub mod trace;

pub use error::{Result, TransportError};
pub use port::{Port, DEFAULT_BUFFER_SIZE};
pub use stream::LinkStream;
pub use tcp::{connect, ConnectConfig, TcpEndpoint};
pub use trace::{TraceLevel, Traced};
