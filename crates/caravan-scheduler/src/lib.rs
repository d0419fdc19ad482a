//! Fixed-size worker pool executing async work units.
//!
//! Work is admitted strictly FIFO and handed to one of N workers. Each
//! submission returns a [`WorkFuture`]: a single-delivery result channel plus
//! an independent cancel trigger wired to the work's cancellation token.
//! Closing the scheduler cancels the root token (which every work token is
//! derived from) and waits until all running work has observed completion.

pub mod error;

#[cfg(test)]
mod tests;

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

pub use error::WorkError;

type ErasedFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A unit of queued work. Owned by the scheduler from submission until a
/// worker has run it; the typed result channel is captured inside `run`.
struct WorkRequest {
    run: Box<dyn FnOnce() -> ErasedFuture + Send>,
}

/// Handle to a submitted work unit.
///
/// The caller owns the future; the scheduler owns the execution. Exactly one
/// result is delivered, even when the work is canceled or panics.
pub struct WorkFuture<T> {
    rx: oneshot::Receiver<Result<T, WorkError>>,
    cancel: CancellationToken,
}

impl<T> WorkFuture<T> {
    /// Waits for the single delivered result.
    pub async fn result(&mut self) -> Result<T, WorkError> {
        match (&mut self.rx).await {
            Ok(result) => result,
            // The request was dropped before a worker ran it (scheduler
            // closed with the work still queued).
            Err(_) => Err(WorkError::Canceled),
        }
    }

    /// Cancels this work's token. The work still delivers exactly one result,
    /// typically `WorkError::Canceled` when it cooperates with the token.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A clone of the work's cancellation token, for callers that need to
    /// trigger cancellation after handing the future elsewhere.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

pub struct Scheduler {
    work_tx: mpsc::UnboundedSender<WorkRequest>,
    close_tx: mpsc::Sender<oneshot::Sender<()>>,
    root: CancellationToken,
}

impl Scheduler {
    /// Creates a scheduler with `nb_workers` workers and spawns its event
    /// loop.
    pub fn new(nb_workers: usize) -> Self {
        let (work_tx, work_rx) = mpsc::unbounded_channel();
        let (close_tx, close_rx) = mpsc::channel(1);
        let root = CancellationToken::new();

        tokio::spawn(run_loop(nb_workers, work_rx, close_rx));

        Self {
            work_tx,
            close_tx,
            root,
        }
    }

    /// Submits a work unit and returns its future. Non-blocking.
    ///
    /// The work receives a cancellation token derived from the scheduler's
    /// root token and must observe it cooperatively. If the scheduler is
    /// already closed, the returned future is pre-filled with
    /// [`WorkError::Canceled`].
    pub fn submit<T, F, Fut>(&self, work: F) -> WorkFuture<T>
    where
        T: Send + 'static,
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, WorkError>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let token = self.root.child_token();
        let future = WorkFuture {
            rx,
            cancel: token.clone(),
        };

        if self.root.is_cancelled() {
            let _ = tx.send(Err(WorkError::Canceled));
            return future;
        }

        let run = Box::new(move || -> ErasedFuture {
            Box::pin(async move {
                // The work runs on its own task so a panic is contained and
                // reported through the result channel instead of tearing the
                // worker down.
                let handle = tokio::spawn(work(token));
                let result = match handle.await {
                    Ok(result) => result,
                    Err(err) if err.is_panic() => Err(WorkError::Panicked(panic_message(err))),
                    Err(_) => Err(WorkError::Canceled),
                };
                let _ = tx.send(result);
            })
        });

        // A failed send means the event loop is gone; dropping the request
        // drops the result sender and the future resolves as canceled.
        let _ = self.work_tx.send(WorkRequest { run });

        future
    }

    /// Cancels all in-flight work and waits until every worker has finished.
    /// Idempotent; subsequent `submit` calls return pre-canceled futures.
    pub async fn close(&self) {
        self.root.cancel();
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.close_tx.send(ack_tx).await.is_ok() {
            let _ = ack_rx.await;
        }
    }
}

async fn run_loop(
    nb_workers: usize,
    mut work_rx: mpsc::UnboundedReceiver<WorkRequest>,
    mut close_rx: mpsc::Receiver<oneshot::Sender<()>>,
) {
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<()>();
    let tracker = TaskTracker::new();
    let mut available = nb_workers;
    let mut pending: VecDeque<WorkRequest> = VecDeque::new();

    loop {
        tokio::select! {
            request = work_rx.recv() => match request {
                Some(request) => {
                    pending.push_back(request);
                    dispatch(&tracker, &done_tx, &mut available, &mut pending);
                }
                // Scheduler handle dropped without close(): wind down.
                None => break,
            },
            Some(()) = done_rx.recv() => {
                available += 1;
                dispatch(&tracker, &done_tx, &mut available, &mut pending);
            }
            ack = close_rx.recv() => {
                // Queued-but-undispatched work is dropped here; dropped
                // result senders surface as Canceled to their futures.
                pending.clear();
                tracker.close();
                tracker.wait().await;
                if let Some(ack) = ack {
                    let _ = ack.send(());
                }
                tracing::debug!("scheduler event loop stopped");
                return;
            }
        }
    }

    tracker.close();
    tracker.wait().await;
}

/// Drains the pending queue as far as available workers allow. FIFO order:
/// requests are paired with workers in submission order.
fn dispatch(
    tracker: &TaskTracker,
    done_tx: &mpsc::UnboundedSender<()>,
    available: &mut usize,
    pending: &mut VecDeque<WorkRequest>,
) {
    while *available > 0 {
        let Some(request) = pending.pop_front() else {
            break;
        };
        *available -= 1;
        let done = done_tx.clone();
        tracker.spawn(async move {
            (request.run)().await;
            let _ = done.send(());
        });
    }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    match err.try_into_panic() {
        Ok(payload) => {
            if let Some(message) = payload.downcast_ref::<&str>() {
                (*message).to_string()
            } else if let Some(message) = payload.downcast_ref::<String>() {
                message.clone()
            } else {
                "unknown panic payload".to_string()
            }
        }
        Err(err) => err.to_string(),
    }
}
