//! Bounded-concurrency directory tree walker
//!
//! Powers recursive relabeling and any other bulk file-tree operation.
//!
//! # Architecture
//!
//! ```text
//!                     ┌─────────────────────────┐
//!                     │        Producer         │
//!                     │  - single thread        │
//!                     │  - readdir, depth-first │
//!                     └───────────┬─────────────┘
//!                                 │ bounded queue (128)
//!       ┌─────────────────────────┼─────────────────────────┐
//!       │                         │                         │
//! ┌─────▼─────┐             ┌─────▼─────┐             ┌─────▼─────┐
//! │  Worker 1 │             │  Worker 2 │             │  Worker N │
//! │  visitor  │             │  visitor  │             │  visitor  │
//! └─────┬─────┘             └─────┬─────┘             └─────┬─────┘
//!       └──────────────► Abort Latch (first error) ◄────────┘
//! ```
//!
//! Symbolic links are reported but never followed. Visiting order is not
//! specified, hard links are not deduplicated, and an aborted walk leaves
//! whatever the visitor already did in place.

pub mod coordinator;
pub mod entry;
pub mod latch;
pub mod producer;
pub mod queue;
pub mod worker;

pub use coordinator::{default_concurrency, WalkCoordinator, WalkStats};
pub use entry::{Entry, EntryType};
pub use latch::AbortLatch;
pub use queue::WORK_QUEUE_CAPACITY;

use crate::error::{BoxError, WalkResult};
use std::io;
use std::path::Path;

/// What a visitor wants the walk to do next
#[derive(Debug)]
pub enum Visit {
    /// Keep going
    Continue,
    /// Do not descend into this directory (ignored for non-directories)
    SkipSubtree,
    /// Stop the whole walk; this error becomes the walk's result unless
    /// another worker latched first
    Abort(BoxError),
}

impl Visit {
    /// Abort with any error type
    pub fn abort<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Visit::Abort(err.into())
    }

    /// Map a fallible operation onto Continue / Abort
    pub fn from_result<E>(result: Result<(), E>) -> Self
    where
        E: Into<BoxError>,
    {
        match result {
            Ok(()) => Visit::Continue,
            Err(e) => Visit::Abort(e.into()),
        }
    }
}

/// Callback invoked once per visited filesystem object.
///
/// `err` is set when the producer could not list `path` (a directory) or
/// could not resolve an entry's type; `entry` is then partial or absent.
/// Calls happen concurrently from several threads.
pub trait Visitor: Send + Sync {
    fn visit(&self, path: &Path, entry: Option<&Entry>, err: Option<&io::Error>) -> Visit;
}

impl<F> Visitor for F
where
    F: Fn(&Path, Option<&Entry>, Option<&io::Error>) -> Visit + Send + Sync,
{
    fn visit(&self, path: &Path, entry: Option<&Entry>, err: Option<&io::Error>) -> Visit {
        self(path, entry, err)
    }
}

/// Walk `root` with the default concurrency
pub fn walk<P, V>(root: P, visitor: V) -> WalkResult
where
    P: AsRef<Path>,
    V: Visitor,
{
    walk_n(root, visitor, default_concurrency())
}

/// Walk `root` with exactly `concurrency` worker threads.
///
/// `concurrency == 0` is rejected before anything is touched. A missing or
/// unreadable root fails before any thread starts.
pub fn walk_n<P, V>(root: P, visitor: V, concurrency: usize) -> WalkResult
where
    P: AsRef<Path>,
    V: Visitor,
{
    WalkCoordinator::new(root.as_ref(), concurrency)?.run(&visitor)
}
