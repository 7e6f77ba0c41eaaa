use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::RawStream;

/// TCP transport.
///
/// Provides bind/accept/connect over TCP. Accepted and connected streams
/// have `TCP_NODELAY` set, since line-oriented traffic is latency bound.
pub struct TcpTransport {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpTransport {
    /// Bind and listen on `addr` (e.g. `127.0.0.1:0`).
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| TransportError::Bind {
                addr: addr.to_string(),
                source: e,
            })?;
        let local_addr = listener.local_addr().map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;

        info!(%local_addr, "listening on tcp");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection.
    pub async fn accept(&self) -> Result<RawStream> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::Accept)?;
        stream.set_nodelay(true)?;
        debug!(%peer, "accepted tcp connection");
        Ok(RawStream::from(stream))
    }

    /// Connect to a listening TCP endpoint.
    pub async fn connect(addr: &str) -> Result<RawStream> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| TransportError::Connect {
                addr: addr.to_string(),
                source: e,
            })?;
        stream.set_nodelay(true)?;
        debug!(addr, "connected over tcp");
        Ok(RawStream::from(stream))
    }

    /// The address this listener is bound to (with the real port when bound to `:0`).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "tcp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_bind_accept_connect() {
        let listener = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().to_string();

        let client = tokio::spawn(async move {
            let mut client = TcpTransport::connect(&addr).await.unwrap();
            client.write_all(b"hello").await.unwrap();
        });

        let mut server = listener.accept().await.unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
        assert_eq!(server.transport_name(), "tcp");

        client.await.unwrap();
    }

    #[tokio::test]
    async fn test_bind_rejects_bad_address() {
        let result = TcpTransport::bind("definitely-not-an-address").await;
        assert!(matches!(result, Err(TransportError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to obtain a port nobody listens on.
        let listener = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().to_string();
        drop(listener);

        let result = TcpTransport::connect(&addr).await;
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }
}
