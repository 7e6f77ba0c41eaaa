use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::warn;

type Completion = Box<dyn FnOnce() + Send>;

/// Runs user callbacks for one queue, in the order they were dispatched,
/// on a task of their own.
///
/// I/O tasks hand finished requests here instead of calling back directly,
/// so a slow or reentrant callback never holds up the next raw read or write.
#[derive(Clone)]
pub(crate) struct CompletionQueue {
    jobs: mpsc::UnboundedSender<Completion>,
}

impl CompletionQueue {
    /// Start the pump. It exits once every clone of the queue is dropped
    /// and the remaining callbacks have run.
    pub(crate) fn spawn(handle: &Handle, socket: Arc<str>, queue: &'static str) -> Self {
        let (jobs, mut pending) = mpsc::unbounded_channel::<Completion>();
        handle.spawn(async move {
            while let Some(job) = pending.recv().await {
                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                    warn!(socket = %socket, queue, "completion callback panicked");
                }
            }
        });
        Self { jobs }
    }

    pub(crate) fn dispatch(&self, job: impl FnOnce() + Send + 'static) {
        if let Err(mpsc::error::SendError(job)) = self.jobs.send(Box::new(job)) {
            // The pump is gone only when the runtime is shutting down.
            job();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn callbacks_run_in_dispatch_order() {
        let queue = CompletionQueue::spawn(&Handle::current(), Arc::from("test"), "send");
        let (tx, mut rx) = mpsc::unbounded_channel();

        for i in 0..32 {
            let tx = tx.clone();
            queue.dispatch(move || {
                let _ = tx.send(i);
            });
        }
        drop(tx);

        let mut seen = Vec::new();
        while let Some(i) = rx.recv().await {
            seen.push(i);
        }
        assert_eq!(seen, (0..32).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn panicking_callback_does_not_stop_the_pump() {
        let queue = CompletionQueue::spawn(&Handle::current(), Arc::from("test"), "receive");
        let (tx, mut rx) = mpsc::unbounded_channel();

        queue.dispatch(|| panic!("boom"));
        queue.dispatch(move || {
            let _ = tx.send("after");
        });

        assert_eq!(rx.recv().await, Some("after"));
    }
}
