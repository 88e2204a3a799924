//! Core trait definitions shared across the celldense crates.

use std::sync::atomic::{AtomicUsize, Ordering};

/// A type that can produce a summary of its contents.
pub trait Summarizable {
    /// A one-line summary suitable for display.
    fn summary(&self) -> String;
}

/// Receives coarse progress updates from long-running ingestion.
///
/// Implementations must be cheap and must not block: the engine calls this
/// from worker threads and never inspects a return value.
pub trait ProgressSink: Sync {
    /// `done` out of `total` steps have completed. `done` never decreases
    /// across calls made for the same ingestion.
    fn progress(&self, done: usize, total: usize);
}

/// A sink that discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn progress(&self, _done: usize, _total: usize) {}
}

/// A sink that remembers the latest reported step count.
#[derive(Debug, Default)]
pub struct LatestProgress {
    done: AtomicUsize,
    total: AtomicUsize,
    calls: AtomicUsize,
}

impl LatestProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last reported `(done, total)` pair.
    pub fn latest(&self) -> (usize, usize) {
        (
            self.done.load(Ordering::Acquire),
            self.total.load(Ordering::Acquire),
        )
    }

    /// Number of updates received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Acquire)
    }
}

impl ProgressSink for LatestProgress {
    fn progress(&self, done: usize, total: usize) {
        self.total.store(total, Ordering::Release);
        self.done.fetch_max(done, Ordering::AcqRel);
        self.calls.fetch_add(1, Ordering::AcqRel);
    }
}

impl<F> ProgressSink for F
where
    F: Fn(usize, usize) + Sync,
{
    fn progress(&self, done: usize, total: usize) {
        self(done, total)
    }
}
