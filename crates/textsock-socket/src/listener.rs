use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use textsock_transport::{Endpoint, RawListener};
use tokio::runtime::Handle;
use tracing::debug;

use crate::config::SocketConfig;
use crate::error::{Result, SocketError};
use crate::socket::StringSocket;

/// Listens for and accepts connections, wrapping each in a [`StringSocket`].
pub struct StringSocketListener {
    listener: RawListener,
    config: SocketConfig,
    next_socket_id: AtomicU64,
}

impl StringSocketListener {
    /// Bind to `endpoint` with the default configuration.
    pub async fn bind(endpoint: &Endpoint) -> Result<Self> {
        Self::bind_with_config(endpoint, SocketConfig::default()).await
    }

    /// Bind to `endpoint`; accepted sockets use `config`.
    pub async fn bind_with_config(endpoint: &Endpoint, config: SocketConfig) -> Result<Self> {
        let listener = RawListener::bind(endpoint).await?;
        debug!(endpoint = %listener.local_endpoint(), "string socket listener bound");
        Ok(Self {
            listener,
            config,
            next_socket_id: AtomicU64::new(1),
        })
    }

    /// Accept the next connection and assign an auto-generated socket id.
    pub async fn accept(&self) -> Result<StringSocket> {
        let stream = self.listener.accept().await?;
        let id = self.next_socket_id.fetch_add(1, Ordering::Relaxed);
        let id = format!("conn-{id}");
        debug!(
            socket = %id,
            transport = stream.transport_name(),
            peer = %stream.peer_label(),
            "connection accepted"
        );
        StringSocket::with_id(stream, self.config.clone(), id)
    }

    /// Accept one connection in the background and hand the result to
    /// `callback` together with `payload`.
    ///
    /// Call again from the callback to keep accepting.
    pub fn begin_accept<P, F>(self: &Arc<Self>, callback: F, payload: P)
    where
        P: Send + 'static,
        F: FnOnce(Result<StringSocket>, P) + Send + 'static,
    {
        let Ok(handle) = Handle::try_current() else {
            callback(Err(SocketError::NoRuntime), payload);
            return;
        };
        let listener = Arc::clone(self);
        handle.spawn(async move {
            let accepted = listener.accept().await;
            callback(accepted, payload);
        });
    }

    /// The endpoint clients should connect to.
    pub fn local_endpoint(&self) -> Endpoint {
        self.listener.local_endpoint()
    }
}
