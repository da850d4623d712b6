use std::time::Duration;

use agdirect_wire::Value;

/// An error the server reported for one call.
///
/// The server answers with the negated sequence number and up to two text
/// values. The connection stays usable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("operation {operation}[{number}] signalled an error in server: {message}{suffix}", suffix = detail_suffix(.detail))]
pub struct ApplicationError {
    pub operation: String,
    pub number: i64,
    pub message: String,
    pub detail: Option<String>,
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|d| format!(" -- {d}"))
        .unwrap_or_default()
}

impl ApplicationError {
    pub(crate) fn from_values(operation: &str, number: i64, values: &[Value]) -> Self {
        let render = |v: &Value| match v {
            Value::Null => "Null".to_string(),
            other => other.to_string(),
        };
        Self {
            operation: operation.to_string(),
            number,
            message: values.first().map_or_else(|| "Unknown".to_string(), render),
            detail: values.get(1).map(render),
        }
    }
}

/// Errors that can occur on an AGDirect connection.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] agdirect_transport::TransportError),

    /// Encoding or decoding error.
    #[error("wire error: {0}")]
    Wire(#[from] agdirect_wire::WireError),

    /// The server has no free connection slot.
    #[error("too many connections")]
    TooManyConnections,

    /// The server refused the connection.
    #[error("connection rejected")]
    Rejected,

    /// The first byte from the server was not a known greeting.
    #[error("unexpected initial reply 0x{0:02x}")]
    UnexpectedGreeting(u8),

    /// Connected, but the server sent nothing.
    #[error("connected but timed out after {0:?} waiting for the greeting")]
    GreetingTimeout(Duration),

    /// The reply names a different operation.
    #[error("reply to {expected} names operation {actual}")]
    OperationMismatch { expected: String, actual: String },

    /// The reply carries a different sequence number.
    #[error("reply to {operation} expected number {expected}, received {actual}")]
    SequenceMismatch {
        operation: String,
        expected: i64,
        actual: i64,
    },

    /// Fewer results arrived than the selector asks for.
    #[error("{operation} expected {expected} result(s), received {received}")]
    MissingResult {
        operation: String,
        expected: usize,
        received: usize,
    },

    /// Results arrived for a call that expects none.
    #[error("{operation} expected zero values, received {received}")]
    UnexpectedResults { operation: String, received: usize },

    /// The server reported an error for the call.
    #[error(transparent)]
    Application(#[from] ApplicationError),

    /// The calling thread already holds this connection.
    #[error("connection is already in use by this thread")]
    Reentrant,

    /// A previous fault left the connection unusable.
    #[error("connection is broken")]
    Broken,

    /// The connection was disconnected.
    #[error("connection is closed")]
    Closed,

    /// The server did not identify itself as an AGDirect server.
    #[error("server verification failed: {0}")]
    VerifyFailed(String),

    /// The argument list is longer than the protocol allows.
    #[error("too many arguments in call: {count} (max {max})")]
    TooManyArguments { count: usize, max: usize },
}

impl LinkError {
    /// Whether this error leaves the connection unusable.
    ///
    /// Application errors and rejected calls that never reached the wire are
    /// recoverable; everything else means the byte stream is out of step.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            LinkError::Application(_) | LinkError::Reentrant | LinkError::TooManyArguments { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;
