//! Walk coordinator - orchestrates one parallel walk
//!
//! The coordinator is responsible for:
//! - Validating the concurrency and opening the root synchronously
//! - Setting up the work queue, the producer and the worker pool
//! - Joining every thread before returning
//! - Turning the abort latch into the walk's single result

use crate::error::{WalkError, WalkResult};
use crate::walker::latch::AbortLatch;
use crate::walker::producer::{Producer, Root};
use crate::walker::queue::{WorkQueue, WORK_QUEUE_CAPACITY};
use crate::walker::worker::{panic_message, Worker, WorkerStats};
use crate::walker::Visitor;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;
use tracing::{debug, warn};

/// Default worker count: twice the logical CPUs, since visitors are
/// syscall-bound rather than CPU-bound
pub fn default_concurrency() -> usize {
    num_cpus::get() * 2
}

/// Counters gathered over one walk
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkStats {
    /// Items handed to the work queue
    pub enqueued: u64,

    /// Items taken off the queue by workers
    pub dequeued: u64,

    /// Sends that found the queue full
    pub backpressure_events: u64,

    /// Visitor invocations
    pub visited: u64,

    /// Directories the visitor skipped
    pub skipped: u64,

    /// Items dropped unvisited after an abort
    pub discarded: u64,
}

/// Configures and runs a single walk
#[derive(Debug, Clone)]
pub struct WalkCoordinator {
    root: PathBuf,
    concurrency: usize,
    queue_capacity: usize,
}

impl WalkCoordinator {
    /// Create a coordinator; `concurrency` must be at least 1
    pub fn new(root: impl Into<PathBuf>, concurrency: usize) -> Result<Self, WalkError> {
        if concurrency < 1 {
            return Err(WalkError::InvalidConcurrency { value: concurrency });
        }

        Ok(Self {
            root: root.into(),
            concurrency,
            queue_capacity: WORK_QUEUE_CAPACITY,
        })
    }

    /// Override the work queue capacity (clamped to at least 1)
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Run the walk, invoking `visitor` once per object
    pub fn run<V>(&self, visitor: &V) -> WalkResult
    where
        V: Visitor + ?Sized,
    {
        self.run_with_stats(visitor).0
    }

    /// Run the walk and also return its counters.
    ///
    /// A root that cannot be opened yields all-zero stats.
    pub fn run_with_stats<V>(&self, visitor: &V) -> (WalkResult, WalkStats)
    where
        V: Visitor + ?Sized,
    {
        let start = Instant::now();

        // Fatal before Running: nothing is spawned for a bad root
        let root = match Root::open(&self.root) {
            Ok(root) => root,
            Err(e) => return (Err(e), WalkStats::default()),
        };

        debug!(
            root = %self.root.display(),
            workers = self.concurrency,
            queue = self.queue_capacity,
            "Starting walk"
        );

        let latch = AbortLatch::new();
        let worker_stats = WorkerStats::default();
        let queue = WorkQueue::new(self.queue_capacity);
        let queue_stats = queue.stats();

        thread::scope(|s| {
            let (sender, receiver) = queue.split();

            let mut workers = Vec::with_capacity(self.concurrency);
            for id in 0..self.concurrency {
                match Worker::spawn(s, id, receiver.clone(), visitor, &latch, &worker_stats) {
                    Ok(worker) => workers.push(worker),
                    Err(e) => {
                        // Dropping the sender on return releases the spawned workers
                        warn!(worker = id, error = %e, "Failed to spawn worker");
                        latch.set(e);
                        return;
                    }
                }
            }
            drop(receiver);

            let latch_ref = &latch;
            let producer = thread::Builder::new()
                .name("walk-producer".to_string())
                .spawn_scoped(s, move || Producer::new(sender, latch_ref).run(root));

            match producer {
                Ok(handle) => match handle.join() {
                    Ok(produced) => {
                        debug!(produced = produced.produced, "Producer joined");
                    }
                    Err(payload) => {
                        latch.set(WalkError::ThreadPanicked {
                            role: "producer",
                            message: panic_message(payload.as_ref()),
                        });
                    }
                },
                Err(source) => {
                    latch.set(WalkError::Spawn {
                        role: "producer",
                        source,
                    });
                }
            }

            for worker in workers {
                if let Err(e) = worker.join() {
                    warn!(error = %e, "Worker failed to join cleanly");
                    latch.set(e);
                }
            }
        });

        let stats = WalkStats {
            enqueued: queue_stats.enqueued(),
            dequeued: queue_stats.throughput(),
            backpressure_events: queue_stats.backpressure_count(),
            visited: worker_stats.visited(),
            skipped: worker_stats.skipped(),
            discarded: worker_stats.discarded(),
        };
        let result = match latch.into_error() {
            Some(e) => Err(e),
            None => Ok(()),
        };

        debug!(
            enqueued = stats.enqueued,
            dequeued = stats.dequeued,
            backpressure = stats.backpressure_events,
            visited = stats.visited,
            skipped = stats.skipped,
            discarded = stats.discarded,
            aborted = result.is_err(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Walk finished"
        );

        (result, stats)
    }
}
