use textsock_transport::Endpoint;
use tracing::debug;

use crate::config::SocketConfig;
use crate::error::Result;
use crate::socket::StringSocket;

/// Connect to `endpoint` with the default configuration.
pub async fn connect(endpoint: &Endpoint) -> Result<StringSocket> {
    connect_with_config(endpoint, SocketConfig::default()).await
}

/// Connect to `endpoint`; the socket uses `config`.
pub async fn connect_with_config(endpoint: &Endpoint, config: SocketConfig) -> Result<StringSocket> {
    let stream = textsock_transport::connect(endpoint).await?;
    let socket = StringSocket::with_config(stream, config)?;
    debug!(socket = %socket.id(), %endpoint, "connected");
    Ok(socket)
}
