use std::path::PathBuf;

/// Errors that can occur while establishing raw byte-stream transports.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// The endpoint string could not be parsed.
    #[error("invalid endpoint {0:?} (expected tcp://host:port, unix:///path, host:port or a path)")]
    InvalidEndpoint(String),

    /// Unix domain sockets are not available on this platform.
    #[error("unix domain sockets are not supported on this platform")]
    Unsupported,
}

pub type Result<T> = std::result::Result<T, TransportError>;
