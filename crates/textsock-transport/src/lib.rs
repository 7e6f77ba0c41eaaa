//! Connected byte-stream transports.
//!
//! Provides the raw channels a string socket is layered on:
//! - TCP streams (all platforms)
//! - Unix domain sockets (Linux/macOS)
//!
//! This is the lowest layer of textsock. Everything else builds on top of
//! the [`RawStream`] type provided here, or on any other Tokio
//! `AsyncRead + AsyncWrite` stream.

pub mod endpoint;
pub mod error;
pub mod listener;
pub mod stream;
pub mod tcp;

#[cfg(unix)]
pub mod uds;

pub use endpoint::Endpoint;
pub use error::{Result, TransportError};
pub use listener::{connect, RawListener};
pub use stream::RawStream;
pub use tcp::TcpTransport;

#[cfg(unix)]
pub use uds::UnixDomainSocket;
