//! Abort latch shared by the producer and the worker pool
//!
//! First `set` wins; the flag is a plain atomic so the hot-path check in
//! every loop iteration never takes the lock.

use crate::error::WalkError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Write-once-wins error cell for one walk invocation
#[derive(Debug, Default)]
pub struct AbortLatch {
    latched: AtomicBool,
    error: Mutex<Option<WalkError>>,
}

impl AbortLatch {
    /// Create an unset latch
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `err` if nothing was recorded yet.
    ///
    /// Returns `true` when this call won. Later errors are dropped but the
    /// latch still reads as set.
    pub fn set(&self, err: WalkError) -> bool {
        let mut slot = self.error.lock();
        let won = slot.is_none();
        if won {
            *slot = Some(err);
        }
        self.latched.store(true, Ordering::Release);
        won
    }

    /// Check whether the walk has been aborted
    pub fn is_set(&self) -> bool {
        self.latched.load(Ordering::Acquire)
    }

    /// Consume the latch, yielding the recorded error
    pub fn into_error(self) -> Option<WalkError> {
        self.error.into_inner()
    }
}
