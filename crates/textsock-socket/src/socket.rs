use std::collections::VecDeque;
use std::fmt;
use std::net::Shutdown;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use textsock_codec::{DecodedBuffer, ReceiveKind, SharedEncoding};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::completion::CompletionQueue;
use crate::config::SocketConfig;
use crate::error::{Result, SocketError};
use crate::receive::ReceiveTask;
use crate::request::{IncomingRequest, OutgoingRequest};
use crate::send::SendTask;

static NEXT_SOCKET_ID: AtomicU64 = AtomicU64::new(1);

/// An asynchronous string socket over a connected byte stream.
///
/// Sends strings and receives newline-terminated lines or exact byte-count
/// strings, encoded with one fixed encoding. Handles are cheap to clone and
/// may be used from any thread; every clone drives the same connection.
///
/// Each direction has its own FIFO queue:
/// - send completions fire in submission order, each exactly once, with
///   `true` once the text is fully written or `false` if the channel failed
/// - receive completions fire in submission order, each exactly once, with
///   the text or `None` if the channel closed first
///
/// Callbacks run on a completion task, never inline in the caller and never
/// on the I/O path, so they may freely issue further sends and receives.
/// They should not block.
///
/// Once the channel reports closure (a zero-byte read or write, or an I/O
/// error), or after [`close`](Self::close), every pending and later request
/// on both queues fails.
#[derive(Clone)]
pub struct StringSocket {
    inner: Arc<Inner>,
}

struct Inner {
    id: Arc<str>,
    encoding: SharedEncoding,
    sends: mpsc::UnboundedSender<OutgoingRequest>,
    receives: mpsc::UnboundedSender<IncomingRequest>,
    closed: CancellationToken,
    send_stop: CancellationToken,
    receive_stop: CancellationToken,
}

impl StringSocket {
    /// Wrap a connected stream, using `encoding` for both directions.
    ///
    /// Must be called within a Tokio runtime; the socket's tasks run on it.
    pub fn new<T>(stream: T, encoding: SharedEncoding) -> Result<Self>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::with_config(stream, SocketConfig::with_encoding(encoding))
    }

    /// Wrap a connected stream with explicit configuration.
    pub fn with_config<T>(stream: T, config: SocketConfig) -> Result<Self>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let id = NEXT_SOCKET_ID.fetch_add(1, Ordering::Relaxed);
        Self::with_id(stream, config, format!("sock-{id}"))
    }

    /// Wrap a connected stream and use `id` in log events.
    pub fn with_id<T>(stream: T, config: SocketConfig, id: impl Into<String>) -> Result<Self>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let handle = Handle::try_current().map_err(|_| SocketError::NoRuntime)?;
        let id: Arc<str> = Arc::from(id.into());
        let (reader, writer) = tokio::io::split(stream);

        let closed = CancellationToken::new();
        let send_stop = closed.child_token();
        let receive_stop = closed.child_token();
        let (sends, send_requests) = mpsc::unbounded_channel();
        let (receives, receive_requests) = mpsc::unbounded_channel();

        let send_task = SendTask {
            socket: Arc::clone(&id),
            writer: Some(writer),
            requests: send_requests,
            encoding: Arc::clone(&config.encoding),
            stop: send_stop.clone(),
            closed: closed.clone(),
            completions: CompletionQueue::spawn(&handle, Arc::clone(&id), "send"),
        };
        let read_size = config.read_buffer_size.max(1);
        let receive_task = ReceiveTask {
            socket: Arc::clone(&id),
            reader: Some(reader),
            requests: receive_requests,
            pending: VecDeque::new(),
            buffer: DecodedBuffer::new(Arc::clone(&config.encoding)),
            chunk: BytesMut::with_capacity(read_size),
            read_size,
            stop: receive_stop.clone(),
            closed: closed.clone(),
            completions: CompletionQueue::spawn(&handle, Arc::clone(&id), "receive"),
        };
        handle.spawn(send_task.run());
        handle.spawn(receive_task.run());

        debug!(socket = %id, encoding = config.encoding.name(), "string socket created");

        Ok(Self {
            inner: Arc::new(Inner {
                id,
                encoding: config.encoding,
                sends,
                receives,
                closed,
                send_stop,
                receive_stop,
            }),
        })
    }

    /// Queue `text` for sending. `callback(true, payload)` fires once the
    /// whole text has been written, `callback(false, payload)` if the
    /// channel failed or was shut down first.
    ///
    /// No delimiter is added; include `"\n"` to send a line.
    pub fn begin_send<P, F>(&self, text: impl Into<String>, callback: F, payload: P)
    where
        P: Send + 'static,
        F: FnOnce(bool, P) + Send + 'static,
    {
        let request = OutgoingRequest::new(text.into(), move |sent| callback(sent, payload));
        if let Err(mpsc::error::SendError(request)) = self.inner.sends.send(request) {
            debug!(socket = %self.inner.id, "send task gone; failing request");
            request.complete(false);
        }
    }

    /// Queue a receive. With `byte_length <= 0` the next line is delivered,
    /// without its newline and without one preceding carriage return.
    /// With `byte_length > 0` exactly that many encoded bytes are delivered,
    /// newlines included.
    ///
    /// `callback(Some(text), payload)` fires on success, `callback(None,
    /// payload)` if the channel closed before the request could be met.
    pub fn begin_receive<P, F>(&self, callback: F, payload: P, byte_length: i64)
    where
        P: Send + 'static,
        F: FnOnce(Option<String>, P) + Send + 'static,
    {
        let kind = ReceiveKind::from_length(byte_length);
        let request = IncomingRequest::new(kind, move |text| callback(text, payload));
        if let Err(mpsc::error::SendError(request)) = self.inner.receives.send(request) {
            debug!(socket = %self.inner.id, "receive task gone; failing request");
            request.complete(None);
        }
    }

    /// Send `text` and wait until it has been fully written.
    pub async fn send(&self, text: impl Into<String>) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.begin_send(
            text,
            |sent, tx: oneshot::Sender<bool>| {
                let _ = tx.send(sent);
            },
            tx,
        );
        match rx.await {
            Ok(true) => Ok(()),
            _ => Err(SocketError::ChannelClosed),
        }
    }

    /// Receive the next line.
    pub async fn recv_line(&self) -> Result<String> {
        self.recv(0).await
    }

    /// Receive exactly `count` encoded bytes of text.
    ///
    /// Queued like every other receive. A count of zero is a line request.
    pub async fn recv_bytes(&self, count: usize) -> Result<String> {
        self.recv(i64::try_from(count).unwrap_or(i64::MAX)).await
    }

    async fn recv(&self, byte_length: i64) -> Result<String> {
        let (tx, rx) = oneshot::channel();
        self.begin_receive(
            |text, tx: oneshot::Sender<Option<String>>| {
                let _ = tx.send(text);
            },
            tx,
            byte_length,
        );
        match rx.await {
            Ok(Some(text)) => Ok(text),
            _ => Err(SocketError::ChannelClosed),
        }
    }

    /// Shut down one or both directions. Pending and later requests in a
    /// shut-down direction fail; shutting down writes also sends end-of-stream
    /// to the peer.
    pub fn shutdown(&self, how: Shutdown) {
        debug!(socket = %self.inner.id, ?how, "shutdown requested");
        match how {
            Shutdown::Read => self.inner.receive_stop.cancel(),
            Shutdown::Write => self.inner.send_stop.cancel(),
            Shutdown::Both => {
                self.inner.receive_stop.cancel();
                self.inner.send_stop.cancel();
            }
        }
    }

    /// Close the socket: every pending and later request fails, and the
    /// stream is released.
    pub fn close(&self) {
        debug!(socket = %self.inner.id, "close requested");
        self.inner.closed.cancel();
    }

    /// `shutdown(Both)` followed by `close()`.
    pub fn dispose(&self) {
        self.shutdown(Shutdown::Both);
        self.close();
    }

    /// Whether the channel has been closed, by either end.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_cancelled()
    }

    /// Identifier used in log events.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// The encoding fixed at construction.
    pub fn encoding(&self) -> &SharedEncoding {
        &self.inner.encoding
    }
}

impl fmt::Debug for StringSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringSocket")
            .field("id", &self.inner.id)
            .field("encoding", &self.inner.encoding.name())
            .field("closed", &self.is_closed())
            .finish()
    }
}
