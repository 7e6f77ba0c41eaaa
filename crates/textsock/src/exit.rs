use std::fmt;
use std::io;

use textsock_codec::CodecError;
use textsock_socket::SocketError;
use textsock_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
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
        io::ErrorKind::ConnectionRefused => FAILURE,
        io::ErrorKind::InvalidData => DATA_INVALID,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::InvalidEndpoint(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn codec_error(context: &str, err: CodecError) -> CliError {
    match err {
        CodecError::UnknownEncoding(_) => CliError::new(USAGE, format!("{context}: {err}")),
    }
}

pub fn socket_error(context: &str, err: SocketError) -> CliError {
    match err {
        SocketError::Transport(err) => transport_error(context, err),
        SocketError::Codec(err) => codec_error(context, err),
        SocketError::ChannelClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        SocketError::NoRuntime => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}
