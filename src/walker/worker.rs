//! Worker thread logic for the parallel walk
//!
//! Each worker:
//! - Pulls work items from the shared queue
//! - Invokes the visitor, catching panics
//! - Answers the producer's verdict channel for directories
//! - Latches the first abort and stops taking new items

use crate::error::WalkError;
use crate::walker::latch::AbortLatch;
use crate::walker::queue::{Verdict, WorkItem, WorkQueueReceiver};
use crate::walker::{Visit, Visitor};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, Scope, ScopedJoinHandle};
use tracing::{debug, trace, warn};

/// Statistics shared by all workers of one walk
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Visitor invocations
    pub visited: AtomicU64,

    /// Directories whose subtree the visitor skipped
    pub skipped: AtomicU64,

    /// Items a worker dequeued after an abort and dropped unvisited
    pub discarded: AtomicU64,
}

impl WorkerStats {
    fn record_visit(&self) {
        self.visited.fetch_add(1, Ordering::Relaxed);
    }

    fn record_skip(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    fn record_discard(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the number of visitor calls made so far
    pub fn visited(&self) -> u64 {
        self.visited.load(Ordering::Relaxed)
    }

    /// Get the number of skipped subtrees
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Get the number of items dropped after an abort
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }
}

/// A scoped worker thread
pub struct Worker<'scope> {
    id: usize,
    handle: ScopedJoinHandle<'scope, ()>,
}

impl<'scope> Worker<'scope> {
    /// Spawn a worker inside `scope`
    pub fn spawn<'env, V>(
        scope: &'scope Scope<'scope, 'env>,
        id: usize,
        queue: WorkQueueReceiver,
        visitor: &'env V,
        latch: &'env AbortLatch,
        stats: &'env WorkerStats,
    ) -> Result<Self, WalkError>
    where
        V: Visitor + ?Sized,
    {
        let handle = thread::Builder::new()
            .name(format!("walk-worker-{}", id))
            .spawn_scoped(scope, move || worker_loop(id, queue, visitor, latch, stats))
            .map_err(|source| WalkError::Spawn {
                role: "worker",
                source,
            })?;

        Ok(Self { id, handle })
    }

    /// Wait for the worker to finish
    pub fn join(self) -> Result<(), WalkError> {
        let id = self.id;
        self.handle.join().map_err(|payload| WalkError::ThreadPanicked {
            role: "worker",
            message: format!("worker {}: {}", id, panic_message(payload.as_ref())),
        })
    }
}

/// Main worker loop
fn worker_loop<V>(
    id: usize,
    queue: WorkQueueReceiver,
    visitor: &V,
    latch: &AbortLatch,
    stats: &WorkerStats,
) where
    V: Visitor + ?Sized,
{
    trace!(worker = id, "Worker starting");

    while let Some(mut item) = queue.recv() {
        if latch.is_set() {
            // Dropping the item also drops its verdict sender
            stats.record_discard();
            break;
        }

        let verdict = item.take_verdict();
        let descend = process_item(id, item, visitor, latch, stats);

        if let Some(verdict) = verdict {
            let answer = if descend {
                Verdict::Descend
            } else {
                Verdict::Skip
            };
            // The producer may already be gone after an abort
            let _ = verdict.send(answer);
        }

        if latch.is_set() {
            break;
        }
    }

    trace!(worker = id, "Worker shutting down");
}

/// Visit one item; returns whether the producer may descend into it
fn process_item<V>(
    worker_id: usize,
    item: WorkItem,
    visitor: &V,
    latch: &AbortLatch,
    stats: &WorkerStats,
) -> bool
where
    V: Visitor + ?Sized,
{
    let WorkItem {
        path, entry, error, ..
    } = item;

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        visitor.visit(&path, entry.as_ref(), error.as_ref())
    }));
    stats.record_visit();

    let visit = match outcome {
        Ok(visit) => visit,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(worker = worker_id, path = %path.display(), panic = %message, "Visitor panicked");
            latch.set(WalkError::VisitorPanicked { path, message });
            return false;
        }
    };

    match visit {
        Visit::Continue => true,
        Visit::SkipSubtree => {
            if entry.as_ref().is_some_and(|e| e.is_dir()) {
                stats.record_skip();
                trace!(worker = worker_id, path = %path.display(), "Visitor skipped subtree");
                false
            } else {
                // Only meaningful for directories
                true
            }
        }
        Visit::Abort(e) => {
            debug!(worker = worker_id, path = %path.display(), error = %e, "Visitor aborted walk");
            latch.set(WalkError::Visitor(e));
            false
        }
    }
}

/// Extract a printable message from a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
