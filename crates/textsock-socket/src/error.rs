/// Errors that can occur in string socket operations.
///
/// Individual send/receive requests never fail with an error value through
/// the callback API; they report `false` / `None` instead. These errors come
/// from construction, binding, connecting, and the future-returning helpers.
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] textsock_transport::TransportError),

    /// Codec configuration error.
    #[error("codec error: {0}")]
    Codec(#[from] textsock_codec::CodecError),

    /// The channel closed (or was shut down) before the request completed.
    #[error("channel closed")]
    ChannelClosed,

    /// A socket was created outside of a Tokio runtime.
    #[error("no tokio runtime available to drive the socket")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, SocketError>;
