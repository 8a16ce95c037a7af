//! Bounded work queue between the traversal producer and the worker pool
//!
//! The producer blocks when the queue is full (backpressure) but never
//! indefinitely: every blocking hand-off polls the abort latch so a walk
//! whose workers have stopped cannot wedge the producer.
//!
//! Directory items carry a one-shot verdict channel. The worker answers it
//! after the visitor returns, and the producer waits for that answer before
//! listing the directory, so a skipped subtree is never enqueued.

use crate::walker::entry::Entry;
use crate::walker::latch::AbortLatch;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default queue capacity
pub const WORK_QUEUE_CAPACITY: usize = 128;

/// How often blocked producer operations re-check the abort latch
pub const LATCH_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Worker's answer for a directory item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// List the directory and enqueue its children
    Descend,
    /// Leave the subtree alone
    Skip,
}

/// One discovered filesystem object waiting to be visited
#[derive(Debug)]
pub struct WorkItem {
    /// Full path of the object
    pub path: PathBuf,

    /// Metadata, possibly partial when `error` is set
    pub entry: Option<Entry>,

    /// Traversal error for this path (failed listing or type lookup)
    pub error: Option<io::Error>,

    /// Present on directory items the producer may descend into
    verdict: Option<Sender<Verdict>>,
}

impl WorkItem {
    /// Create an item for a successfully discovered object
    pub fn new(path: PathBuf, entry: Entry) -> Self {
        Self {
            path,
            entry: Some(entry),
            error: None,
            verdict: None,
        }
    }

    /// Create an error-carrying item
    pub fn failed(path: PathBuf, entry: Option<Entry>, error: io::Error) -> Self {
        Self {
            path,
            entry,
            error: Some(error),
            verdict: None,
        }
    }

    /// Attach a verdict channel; returns the receiving end for the producer
    pub fn with_verdict(mut self) -> (Self, Receiver<Verdict>) {
        let (tx, rx) = bounded(1);
        self.verdict = Some(tx);
        (self, rx)
    }

    /// Take the verdict sender, leaving `None`
    pub fn take_verdict(&mut self) -> Option<Sender<Verdict>> {
        self.verdict.take()
    }
}

/// Statistics for the work queue
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Total items enqueued
    pub enqueued: AtomicU64,

    /// Total items dequeued
    pub dequeued: AtomicU64,

    /// Number of sends that found the queue full
    pub backpressure_events: AtomicU64,
}

impl QueueStats {
    /// Get total enqueued items
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Get queue throughput (dequeued items)
    pub fn throughput(&self) -> u64 {
        self.dequeued.load(Ordering::Relaxed)
    }

    /// Get backpressure event count
    pub fn backpressure_count(&self) -> u64 {
        self.backpressure_events.load(Ordering::Relaxed)
    }
}

/// Why an enqueue did not happen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendAborted {
    /// The abort latch was set while waiting
    Latched,
    /// All workers are gone
    Disconnected,
}

/// Bounded work queue
pub struct WorkQueue {
    sender: Sender<WorkItem>,
    receiver: Receiver<WorkItem>,
    stats: Arc<QueueStats>,
}

impl WorkQueue {
    /// Create a new work queue with the specified capacity (at least 1)
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));

        Self {
            sender,
            receiver,
            stats: Arc::new(QueueStats::default()),
        }
    }

    /// Get queue statistics
    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }

    /// Split into the producer's sender and a cloneable receiver.
    ///
    /// Consuming the queue matters: workers see disconnection only once the
    /// single sender is dropped.
    pub fn split(self) -> (WorkQueueSender, WorkQueueReceiver) {
        (
            WorkQueueSender {
                sender: self.sender,
                stats: Arc::clone(&self.stats),
            },
            WorkQueueReceiver {
                receiver: self.receiver,
                stats: self.stats,
            },
        )
    }
}

/// Handle for sending items to the queue
pub struct WorkQueueSender {
    sender: Sender<WorkItem>,
    stats: Arc<QueueStats>,
}

impl WorkQueueSender {
    /// Send an item, blocking while the queue is full.
    ///
    /// Gives up once the latch is set or every receiver is gone.
    pub fn send(&self, item: WorkItem, latch: &AbortLatch) -> Result<(), SendAborted> {
        let mut item = item;
        let mut waited = false;
        loop {
            if latch.is_set() {
                return Err(SendAborted::Latched);
            }
            match self.sender.send_timeout(item, LATCH_POLL_INTERVAL) {
                Ok(()) => {
                    self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                    return Ok(());
                }
                Err(SendTimeoutError::Timeout(returned)) => {
                    if !waited {
                        self.stats.backpressure_events.fetch_add(1, Ordering::Relaxed);
                        waited = true;
                    }
                    item = returned;
                }
                Err(SendTimeoutError::Disconnected(_)) => return Err(SendAborted::Disconnected),
            }
        }
    }
}

/// Handle for receiving items from the queue
#[derive(Clone)]
pub struct WorkQueueReceiver {
    receiver: Receiver<WorkItem>,
    stats: Arc<QueueStats>,
}

impl WorkQueueReceiver {
    /// Receive an item from the queue
    ///
    /// This will block until an item is available or the sender is dropped.
    pub fn recv(&self) -> Option<WorkItem> {
        match self.receiver.recv() {
            Ok(item) => {
                self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
                Some(item)
            }
            Err(_) => None,
        }
    }
}

/// Wait for a worker's verdict on a directory.
///
/// `None` means the walk is stopping: either the latch was set or the item
/// was dropped unanswered.
pub fn await_verdict(verdict: &Receiver<Verdict>, latch: &AbortLatch) -> Option<Verdict> {
    loop {
        match verdict.recv_timeout(LATCH_POLL_INTERVAL) {
            Ok(v) => return Some(v),
            Err(RecvTimeoutError::Timeout) => {
                if latch.is_set() {
                    return None;
                }
            }
            Err(RecvTimeoutError::Disconnected) => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WalkError;
    use crate::walker::entry::EntryType;
    use std::ffi::OsStr;
    use std::thread;

    fn item(path: &str) -> WorkItem {
        WorkItem::new(
            path.into(),
            Entry::partial(OsStr::new(path), EntryType::File, 1),
        )
    }

    #[test]
    fn test_queue_basic() {
        let queue = WorkQueue::new(10);
        let (sender, receiver) = queue.split();
        let latch = AbortLatch::new();

        sender.send(item("/test"), &latch).unwrap();

        let got = receiver.recv().unwrap();
        assert_eq!(got.path, PathBuf::from("/test"));
        assert!(got.error.is_none());
    }

    #[test]
    fn test_full_queue_gives_up_when_latched() {
        let queue = WorkQueue::new(1);
        let stats = queue.stats();
        let (sender, _receiver) = queue.split();
        let latch = AbortLatch::new();

        sender.send(item("/a"), &latch).unwrap();

        let result = thread::scope(|s| {
            let h = s.spawn(|| sender.send(item("/b"), &latch));
            thread::sleep(Duration::from_millis(30));
            latch.set(WalkError::Visitor("stop".into()));
            h.join().unwrap()
        });
        assert_eq!(result, Err(SendAborted::Latched));
        assert_eq!(stats.enqueued(), 1);
        assert_eq!(stats.backpressure_count(), 1);
    }

    #[test]
    fn test_send_after_receivers_gone() {
        let (sender, receiver) = WorkQueue::new(4).split();
        drop(receiver);
        let latch = AbortLatch::new();
        assert_eq!(
            sender.send(item("/a"), &latch),
            Err(SendAborted::Disconnected)
        );
    }

    #[test]
    fn test_receiver_sees_disconnect() {
        let (sender, receiver) = WorkQueue::new(4).split();
        let latch = AbortLatch::new();
        sender.send(item("/a"), &latch).unwrap();
        drop(sender);

        assert!(receiver.recv().is_some());
        assert!(receiver.recv().is_none());
    }

    #[test]
    fn test_verdict_round_trip() {
        let latch = AbortLatch::new();
        let (mut dir, rx) = item("/dir").with_verdict();
        dir.take_verdict().unwrap().send(Verdict::Skip).unwrap();
        assert_eq!(await_verdict(&rx, &latch), Some(Verdict::Skip));
    }

    #[test]
    fn test_verdict_dropped_or_latched() {
        let latch = AbortLatch::new();
        let (dir, rx) = item("/dir").with_verdict();
        drop(dir);
        assert_eq!(await_verdict(&rx, &latch), None);

        let (_dir, rx) = item("/dir").with_verdict();
        latch.set(WalkError::Visitor("stop".into()));
        assert_eq!(await_verdict(&rx, &latch), None);
    }

    #[test]
    fn test_queue_stats() {
        let queue = WorkQueue::new(10);
        let stats = queue.stats();
        let (sender, receiver) = queue.split();
        let latch = AbortLatch::new();

        sender.send(item("/a"), &latch).unwrap();
        sender.send(item("/b"), &latch).unwrap();
        receiver.recv().unwrap();
        receiver.recv().unwrap();

        assert_eq!(stats.enqueued(), 2);
        assert_eq!(stats.throughput(), 2);
        assert_eq!(stats.backpressure_count(), 0);
    }
}
