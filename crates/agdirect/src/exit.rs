use std::fmt;
use std::io;

use agdirect_link::LinkError;
use agdirect_transport::TransportError;
use agdirect_wire::WireError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
/// The server answered the call with an application error.
pub const APPLICATION_ERROR: i32 = 2;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Connect { ref source, .. } if source.kind() != io::ErrorKind::TimedOut => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
    }
}

pub fn wire_error(context: &str, err: WireError) -> CliError {
    match err {
        WireError::Io(source) => io_error(context, source),
        WireError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn link_error(context: &str, err: LinkError) -> CliError {
    match err {
        LinkError::Transport(err) => transport_error(context, err),
        LinkError::Wire(err) => wire_error(context, err),
        LinkError::Application(_) => {
            CliError::new(APPLICATION_ERROR, format!("{context}: {err}"))
        }
        LinkError::GreetingTimeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        LinkError::TooManyArguments { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        LinkError::UnexpectedGreeting(_)
        | LinkError::OperationMismatch { .. }
        | LinkError::SequenceMismatch { .. }
        | LinkError::MissingResult { .. }
        | LinkError::UnexpectedResults { .. }
        | LinkError::VerifyFailed(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        LinkError::TooManyConnections | LinkError::Rejected | LinkError::Closed => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}
