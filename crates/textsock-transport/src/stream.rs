use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

/// A connected raw byte stream implementing `AsyncRead + AsyncWrite`.
///
/// This is the fundamental I/O type returned by transport operations.
/// It wraps either a TCP stream or, on Unix, a Unix domain socket stream.
pub struct RawStream {
    inner: RawStreamInner,
}

enum RawStreamInner {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(tokio::net::UnixStream),
}

impl From<TcpStream> for RawStream {
    fn from(stream: TcpStream) -> Self {
        Self {
            inner: RawStreamInner::Tcp(stream),
        }
    }
}

#[cfg(unix)]
impl From<tokio::net::UnixStream> for RawStream {
    fn from(stream: tokio::net::UnixStream) -> Self {
        Self {
            inner: RawStreamInner::Unix(stream),
        }
    }
}

impl RawStream {
    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            RawStreamInner::Tcp(_) => "tcp",
            #[cfg(unix)]
            RawStreamInner::Unix(_) => "unix-domain-socket",
        }
    }

    /// Human-readable description of the remote end, used in log fields.
    pub fn peer_label(&self) -> String {
        match &self.inner {
            RawStreamInner::Tcp(stream) => stream
                .peer_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| "tcp:unknown".to_string()),
            #[cfg(unix)]
            RawStreamInner::Unix(stream) => stream
                .peer_addr()
                .ok()
                .and_then(|addr| addr.as_pathname().map(|p| p.display().to_string()))
                .unwrap_or_else(|| "unix:unnamed".to_string()),
        }
    }
}

impl AsyncRead for RawStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            RawStreamInner::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            #[cfg(unix)]
            RawStreamInner::Unix(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for RawStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut self.get_mut().inner {
            RawStreamInner::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            #[cfg(unix)]
            RawStreamInner::Unix(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            RawStreamInner::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            #[cfg(unix)]
            RawStreamInner::Unix(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            RawStreamInner::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            #[cfg(unix)]
            RawStreamInner::Unix(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

impl std::fmt::Debug for RawStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawStream")
            .field("type", &self.transport_name())
            .finish()
    }
}
