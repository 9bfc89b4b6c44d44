//! Serial queue: one work item at a time, idempotent disposal.
//!
//! The lock is a single-permit `tokio::sync::Semaphore`. Waiting for it
//! suspends the task rather than blocking a worker thread, and the permit is
//! an RAII guard, so it is handed back on every exit path of a work item:
//! normal return, returned error, panic, or the `enqueue` future being
//! dropped mid-flight.
//!
//! Disposal is claimed with a compare-and-set on the lifecycle marker. The
//! winner waits for the permit (i.e. for the in-flight item), then closes the
//! semaphore. Waiters that were parked on the semaphore when disposal began
//! re-check the marker once they get the permit and bail out with
//! [`Error::Disposed`]; waiters still parked when the semaphore closes are
//! woken with an acquire error and bail out the same way.
//!
//! If the disposing caller gives up before the in-flight item finishes, the
//! semaphore is still closed but the marker stays `Disposing`; whoever next
//! hands the permit back to the closed semaphore moves it to `Disposed`.

pub mod state;

pub use state::QueueState;

use crate::error::{Error, Result};
use crate::telemetry::metrics;
use crate::telemetry::work::start_work_span;
use opentelemetry::KeyValue;
use state::Lifecycle;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::time::Instant;
use tracing::{Instrument, debug, trace, warn};
use uuid::Uuid;

/// Newtype for queue IDs, used to correlate logs and spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct QueueId(pub Uuid);

impl QueueId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for QueueId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for QueueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short display: first 8 chars of UUID
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Serializes asynchronous work submitted by any number of concurrent callers.
///
/// Owners typically keep one queue per shared channel and route every
/// outgoing command through [`enqueue`](Self::enqueue):
///
/// ```no_run
/// # async fn example() -> serialq::Result<()> {
/// let queue = serialq::SerialQueue::new();
/// let reply = queue.enqueue(|| async { "pong" }).await?;
/// assert_eq!(reply, "pong");
/// queue.dispose_async().await;
/// # Ok(())
/// # }
/// ```
pub struct SerialQueue {
    id: QueueId,
    permit: Semaphore,
    lifecycle: Lifecycle,
    next_seq: AtomicU64,
}

impl SerialQueue {
    pub fn new() -> Self {
        Self {
            id: QueueId::new(),
            permit: Semaphore::new(1),
            lifecycle: Lifecycle::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> QueueId {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> QueueState {
        self.lifecycle.load()
    }

    /// True once disposal has been claimed, even if it has not finished yet.
    pub fn is_disposed(&self) -> bool {
        !self.lifecycle.is_open()
    }

    /// Run `work` once no other work item on this queue is running.
    ///
    /// The output of `work` is returned unchanged; if it is itself a
    /// `Result`, its error is the caller's to handle and leaves the queue
    /// usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] without running `work` if disposal has
    /// been claimed, either before the call or while it was waiting.
    pub async fn enqueue<F, Fut>(&self, work: F) -> Result<Fut::Output>
    where
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        if !self.lifecycle.is_open() {
            return Err(self.reject("closed before wait"));
        }

        let waiting_since = Instant::now();
        let Ok(permit) = self.permit.acquire().await else {
            return Err(self.reject("lock closed while waiting"));
        };
        let _held = Held {
            queue: self,
            permit: Some(permit),
        };
        // Disposal may have been claimed while we were parked.
        if !self.lifecycle.is_open() {
            return Err(self.reject("disposal claimed while waiting"));
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let wait_ms = waiting_since.elapsed().as_secs_f64() * 1000.0;
        metrics::work_wait_ms().record(wait_ms, &[]);
        metrics::work_submitted().add(1, &[KeyValue::new("result", "ok")]);
        trace!(queue.id = %self.id, work.seq = seq, wait_ms, "work admitted");

        let span = start_work_span(&self.id, seq);
        let running_since = Instant::now();
        let output = work().instrument(span).await;
        metrics::work_run_ms().record(running_since.elapsed().as_secs_f64() * 1000.0, &[]);

        Ok(output)
    }

    /// [`enqueue`](Self::enqueue) for fallible work, folding the disposed
    /// rejection into the work item's own error type.
    pub async fn try_enqueue<F, Fut, T, E>(&self, work: F) -> std::result::Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<Error>,
    {
        self.enqueue(work).await?
    }

    /// Dispose the queue, suspending until any in-flight work item finishes.
    ///
    /// Safe to call any number of times from any number of tasks. Returns
    /// `true` only for the call that performed the teardown. Never fails.
    ///
    /// If this future is dropped while waiting, the queue is still closed to
    /// new work; it stays `Disposing` until the in-flight item finishes.
    pub async fn dispose_async(&self) -> bool {
        let Some(teardown) = self.claim_disposal() else {
            return false;
        };
        let permit = self.permit.acquire().await;
        drop(permit);
        drop(teardown);
        true
    }

    /// Blocking counterpart of [`dispose_async`](Self::dispose_async).
    ///
    /// Blocks the calling thread until any in-flight work item finishes. On a
    /// multi-threaded runtime the worker is handed off via
    /// `block_in_place`. Calling this from a current-thread runtime while the
    /// in-flight item needs that same thread deadlocks; use `dispose_async`
    /// there. A warning is logged when that situation is possible.
    pub fn dispose(&self) -> bool {
        let Some(teardown) = self.claim_disposal() else {
            return false;
        };
        if let Ok(permit) = self.permit.try_acquire() {
            drop(permit);
            drop(teardown);
            return true;
        }

        let acquire = self.permit.acquire();
        let permit = match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| futures::executor::block_on(acquire))
            }
            Ok(_) => {
                warn!(
                    queue.id = %self.id,
                    "blocking dispose on a current-thread runtime while work is in flight; \
                     this deadlocks if the work needs this thread"
                );
                futures::executor::block_on(acquire)
            }
            Err(_) => futures::executor::block_on(acquire),
        };
        drop(permit);
        drop(teardown);
        true
    }

    fn claim_disposal(&self) -> Option<Teardown<'_>> {
        if !self.lifecycle.begin_disposal() {
            trace!(queue.id = %self.id, state = %self.state(), "disposal already claimed");
            return None;
        }
        debug!(queue.id = %self.id, "disposal claimed, waiting for in-flight work");
        Some(Teardown { queue: self })
    }

    /// Move `Disposing -> Disposed` once the lock is closed and free.
    ///
    /// Called by the disposer and by every permit holder on release, so the
    /// transition happens whichever of them finishes last.
    fn settle_disposal(&self) {
        if !self.permit.is_closed() || self.permit.available_permits() == 0 {
            return;
        }
        if self.lifecycle.finish_disposal() {
            metrics::queue_disposals().add(1, &[]);
            debug!(queue.id = %self.id, "queue disposed");
        }
    }

    fn reject(&self, reason: &'static str) -> Error {
        metrics::work_submitted().add(1, &[KeyValue::new("result", "disposed")]);
        trace!(queue.id = %self.id, reason, "work rejected");
        Error::Disposed
    }
}

impl Default for SerialQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SerialQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialQueue")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for SerialQueue {
    fn drop(&mut self) {
        // `&mut self`: no work item can be holding the permit.
        if let Some(teardown) = self.claim_disposal() {
            drop(teardown);
        }
    }
}

/// Closes the lock for a claimed disposal when dropped, including when the
/// disposing future is cancelled mid-wait.
struct Teardown<'a> {
    queue: &'a SerialQueue,
}

impl Drop for Teardown<'_> {
    fn drop(&mut self) {
        self.queue.permit.close();
        self.queue.settle_disposal();
    }
}

/// The lock held by one `enqueue` call.
struct Held<'a> {
    queue: &'a SerialQueue,
    permit: Option<SemaphorePermit<'a>>,
}

impl Drop for Held<'_> {
    fn drop(&mut self) {
        // Release first so a pending disposal sees the lock free.
        drop(self.permit.take());
        self.queue.settle_disposal();
    }
}
