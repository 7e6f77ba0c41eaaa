use std::collections::VecDeque;
use std::io::{self, ErrorKind};
use std::sync::Arc;

use bytes::BytesMut;
use textsock_codec::DecodedBuffer;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::completion::CompletionQueue;
use crate::request::IncomingRequest;

/// Owns the read half, the receive queue and the decoded buffer.
///
/// Raw reads are issued only while a request is waiting that the buffer
/// cannot satisfy, so nothing is read ahead of demand.
pub(crate) struct ReceiveTask<R> {
    pub(crate) socket: Arc<str>,
    pub(crate) reader: Option<R>,
    pub(crate) requests: mpsc::UnboundedReceiver<IncomingRequest>,
    pub(crate) pending: VecDeque<IncomingRequest>,
    pub(crate) buffer: DecodedBuffer,
    pub(crate) chunk: BytesMut,
    pub(crate) read_size: usize,
    /// Cancelled by `shutdown(Read)` or, through its parent, on closure.
    pub(crate) stop: CancellationToken,
    /// Cancelled when the channel is found dead; fails the send side too.
    pub(crate) closed: CancellationToken,
    pub(crate) completions: CompletionQueue,
}

enum Wake {
    Stop,
    Request(Option<IncomingRequest>),
    Read(io::Result<usize>),
}

impl<R: AsyncRead + Unpin> ReceiveTask<R> {
    pub(crate) async fn run(mut self) {
        let mut intake_open = true;
        loop {
            if self.reader.is_some() && self.stop.is_cancelled() {
                self.release_reader("shutdown");
            }

            if self.reader.is_none() {
                self.fail_pending();
                if !intake_open {
                    break;
                }
                match self.requests.recv().await {
                    Some(request) => self.pending.push_back(request),
                    None => intake_open = false,
                }
                continue;
            }

            self.satisfy_pending();
            if self.pending.is_empty() && !intake_open {
                break;
            }

            let Some(reader) = self.reader.as_mut() else {
                continue;
            };
            let wake = if self.pending.is_empty() {
                tokio::select! {
                    biased;
                    _ = self.stop.cancelled() => Wake::Stop,
                    request = self.requests.recv() => Wake::Request(request),
                }
            } else {
                self.chunk.clear();
                self.chunk.reserve(self.read_size);
                tokio::select! {
                    biased;
                    _ = self.stop.cancelled() => Wake::Stop,
                    request = self.requests.recv(), if intake_open => Wake::Request(request),
                    read = reader.read_buf(&mut self.chunk) => Wake::Read(read),
                }
            };

            match wake {
                Wake::Stop => self.release_reader("shutdown"),
                Wake::Request(Some(request)) => self.pending.push_back(request),
                Wake::Request(None) => intake_open = false,
                Wake::Read(Ok(0)) => {
                    debug!(socket = %self.socket, "read returned zero bytes; channel closed");
                    self.closed.cancel();
                    self.release_reader("end of stream");
                }
                Wake::Read(Ok(n)) => {
                    let records = self.buffer.feed(&self.chunk[..n]);
                    trace!(socket = %self.socket, read = n, records, "raw read");
                }
                Wake::Read(Err(err)) if err.kind() == ErrorKind::Interrupted => {}
                Wake::Read(Err(err)) => {
                    warn!(socket = %self.socket, error = %err, "read failed; channel closed");
                    self.closed.cancel();
                    self.release_reader("read error");
                }
            }
        }

        debug!(socket = %self.socket, "receive task finished");
    }

    /// Satisfy queued requests from the buffer, front first, until one
    /// cannot be satisfied yet.
    fn satisfy_pending(&mut self) {
        while let Some(request) = self.pending.front() {
            let Some(text) = self.buffer.take(request.kind) else {
                break;
            };
            if let Some(request) = self.pending.pop_front() {
                self.completions
                    .dispatch(move || request.complete(Some(text)));
            }
        }
    }

    fn fail_pending(&mut self) {
        for request in self.pending.drain(..) {
            self.completions.dispatch(move || request.complete(None));
        }
    }

    fn release_reader(&mut self, reason: &'static str) {
        if self.reader.take().is_some() {
            self.buffer.finish();
            debug!(
                socket = %self.socket,
                reason,
                buffered_bytes = self.buffer.buffered_bytes(),
                failed = self.pending.len(),
                "read half released"
            );
        }
    }
}
