//! Request/response connections for the AGDirect protocol.
//!
//! A [`Connection`] owns one socket to the server. Each call writes an
//! operation frame, flushes, and (for two-way calls) reads the matching reply
//! before the next call may start. Calls from several threads are serialized.

pub mod call;
pub mod config;
pub mod connection;
pub mod connector;
pub mod control;
pub mod error;
pub mod gate;
pub mod handshake;
pub mod stub;

pub use call::{validate_reply, CallStyle, ResultSelector, MAX_CALL_ARGS};
pub use config::{LinkConfig, DEFAULT_PORT};
pub use connection::{Batch, Connection};
pub use connector::{connect, connect_with_config};
pub use control::{ServerInfo, OP_DISCONNECT, OP_VERIFY, VERIFY_PREFIX};
pub use error::{ApplicationError, LinkError, Result};
pub use handshake::{client_handshake, expect_greeting, send_greeting, Greeting};
pub use stub::{echo_handler, serve_connection, Reply, StubHandle, StubServer};
