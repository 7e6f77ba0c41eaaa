use crate::endpoint::Endpoint;
#[cfg(not(unix))]
use crate::error::TransportError;
use crate::error::Result;
use crate::stream::RawStream;
use crate::tcp::TcpTransport;
#[cfg(unix)]
use crate::uds::UnixDomainSocket;

/// A bound listener for either transport, selected by [`Endpoint`].
pub enum RawListener {
    Tcp(TcpTransport),
    #[cfg(unix)]
    Unix(UnixDomainSocket),
}

impl RawListener {
    /// Bind to `endpoint`. Must be called within a Tokio runtime.
    pub async fn bind(endpoint: &Endpoint) -> Result<Self> {
        match endpoint {
            Endpoint::Tcp(addr) => Ok(Self::Tcp(TcpTransport::bind(addr).await?)),
            #[cfg(unix)]
            Endpoint::Unix(path) => Ok(Self::Unix(UnixDomainSocket::bind(path)?)),
            #[cfg(not(unix))]
            Endpoint::Unix(_) => Err(TransportError::Unsupported),
        }
    }

    /// Accept the next incoming connection.
    pub async fn accept(&self) -> Result<RawStream> {
        match self {
            Self::Tcp(listener) => listener.accept().await,
            #[cfg(unix)]
            Self::Unix(listener) => listener.accept().await,
        }
    }

    /// The endpoint clients should connect to (resolved port for `:0` binds).
    pub fn local_endpoint(&self) -> Endpoint {
        match self {
            Self::Tcp(listener) => Endpoint::Tcp(listener.local_addr().to_string()),
            #[cfg(unix)]
            Self::Unix(listener) => Endpoint::Unix(listener.path().to_path_buf()),
        }
    }
}

/// Connect to `endpoint` with the matching transport.
pub async fn connect(endpoint: &Endpoint) -> Result<RawStream> {
    match endpoint {
        Endpoint::Tcp(addr) => TcpTransport::connect(addr).await,
        #[cfg(unix)]
        Endpoint::Unix(path) => UnixDomainSocket::connect(path).await,
        #[cfg(not(unix))]
        Endpoint::Unix(_) => Err(TransportError::Unsupported),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn tcp_endpoint_resolves_bound_port() {
        let listener = RawListener::bind(&"127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let endpoint = listener.local_endpoint();
        match &endpoint {
            Endpoint::Tcp(addr) => assert!(!addr.ends_with(":0")),
            other => panic!("unexpected endpoint {other:?}"),
        }

        let client = tokio::spawn(async move {
            let mut stream = connect(&endpoint).await.unwrap();
            stream.write_all(b"x").await.unwrap();
        });
        let mut server = listener.accept().await.unwrap();
        let mut byte = [0u8; 1];
        server.read_exact(&mut byte).await.unwrap();
        assert_eq!(&byte, b"x");
        client.await.unwrap();
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn unix_endpoint_round_trip() {
        let dir = std::env::temp_dir().join(format!("textsock-rawlistener-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let endpoint = Endpoint::Unix(dir.join("raw.sock"));

        let listener = RawListener::bind(&endpoint).await.unwrap();
        assert_eq!(listener.local_endpoint(), endpoint);

        let client = tokio::spawn(async move {
            let mut stream = connect(&endpoint).await.unwrap();
            stream.write_all(b"y").await.unwrap();
        });
        let mut server = listener.accept().await.unwrap();
        let mut byte = [0u8; 1];
        server.read_exact(&mut byte).await.unwrap();
        assert_eq!(&byte, b"y");
        client.await.unwrap();

        drop(listener);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
