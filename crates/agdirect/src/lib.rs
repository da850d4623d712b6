//! Client for the AGDirect binary RPC protocol.
//!
//! agdirect talks to a graph database server over one TCP socket per
//! connection: tagged binary values, operation frames correlated by sequence
//! number, and at most one request in flight per connection.
//!
//! # Crate Structure
//!
//! - [`transport`]: sockets, connect polling, output buffering, byte tracing
//! - [`wire`]: the value codec and operation frames
//! - [`link`]: connections, calls and the stub server (behind `link` feature)

/// Re-export transport types.
pub mod transport {
    pub use agdirect_transport::*;
}

/// Re-export wire codec types.
pub mod wire {
    pub use agdirect_wire::*;
}

/// Re-export connection types (requires `link` feature).
#[cfg(feature = "link")]
pub mod link {
    pub use agdirect_link::*;
}
