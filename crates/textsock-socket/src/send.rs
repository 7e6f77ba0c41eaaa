use std::io::{self, ErrorKind};
use std::sync::Arc;

use textsock_codec::SharedEncoding;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::completion::CompletionQueue;
use crate::request::OutgoingRequest;

/// Owns the write half and the send queue.
///
/// Requests are transmitted one at a time: request k is fully written and
/// flushed (or has failed) before request k+1 is dequeued, and at most one
/// raw write is outstanding.
pub(crate) struct SendTask<W> {
    pub(crate) socket: Arc<str>,
    pub(crate) writer: Option<W>,
    pub(crate) requests: mpsc::UnboundedReceiver<OutgoingRequest>,
    pub(crate) encoding: SharedEncoding,
    /// Cancelled by `shutdown(Write)` or, through its parent, on closure.
    pub(crate) stop: CancellationToken,
    /// Cancelled when the channel is found dead; fails the receive side too.
    pub(crate) closed: CancellationToken,
    pub(crate) completions: CompletionQueue,
}

enum Wake {
    Stop,
    Request(Option<OutgoingRequest>),
}

enum Transmit {
    Sent,
    Stopped,
    Closed,
    Failed(io::Error),
}

impl<W: AsyncWrite + Unpin> SendTask<W> {
    pub(crate) async fn run(mut self) {
        loop {
            let wake = if self.writer.is_some() {
                tokio::select! {
                    biased;
                    _ = self.stop.cancelled() => Wake::Stop,
                    request = self.requests.recv() => Wake::Request(request),
                }
            } else {
                Wake::Request(self.requests.recv().await)
            };

            let request = match wake {
                Wake::Stop => {
                    self.release_writer("shutdown").await;
                    continue;
                }
                Wake::Request(Some(request)) => request,
                Wake::Request(None) => break,
            };

            let Some(writer) = self.writer.as_mut() else {
                self.finish(request, false);
                continue;
            };

            let bytes = self.encoding.encode(&request.text);
            match transmit(writer, &bytes, &self.stop, &self.socket).await {
                Transmit::Sent => self.finish(request, true),
                Transmit::Stopped => {
                    self.finish(request, false);
                    self.release_writer("shutdown").await;
                }
                Transmit::Closed => {
                    debug!(socket = %self.socket, "write accepted zero bytes; channel closed");
                    self.closed.cancel();
                    self.finish(request, false);
                    self.writer = None;
                }
                Transmit::Failed(err) => {
                    warn!(socket = %self.socket, error = %err, "write failed; channel closed");
                    self.closed.cancel();
                    self.finish(request, false);
                    self.writer = None;
                }
            }
        }

        self.release_writer("all handles dropped").await;
        debug!(socket = %self.socket, "send task finished");
    }

    fn finish(&self, request: OutgoingRequest, sent: bool) {
        self.completions.dispatch(move || request.complete(sent));
    }

    async fn release_writer(&mut self, reason: &'static str) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(err) = writer.shutdown().await {
                trace!(socket = %self.socket, error = %err, "write shutdown failed");
            }
            debug!(socket = %self.socket, reason, "write half released");
        }
    }
}

/// Write `bytes` in full through successive partial writes, then flush.
async fn transmit<W: AsyncWrite + Unpin>(
    writer: &mut W,
    bytes: &[u8],
    stop: &CancellationToken,
    socket: &str,
) -> Transmit {
    let mut offset = 0usize;
    while offset < bytes.len() {
        let result = tokio::select! {
            biased;
            _ = stop.cancelled() => return Transmit::Stopped,
            result = writer.write(&bytes[offset..]) => result,
        };
        match result {
            Ok(0) => return Transmit::Closed,
            Ok(n) => {
                offset += n;
                trace!(socket, wrote = n, offset, total = bytes.len(), "partial write");
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Transmit::Failed(err),
        }
    }

    let flushed = tokio::select! {
        biased;
        _ = stop.cancelled() => return Transmit::Stopped,
        flushed = writer.flush() => flushed,
    };
    match flushed {
        Ok(()) => Transmit::Sent,
        Err(err) => Transmit::Failed(err),
    }
}
