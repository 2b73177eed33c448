//! Worker telemetry counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic operation counters shared between the facade and the write
/// worker. Readable while operations are in flight.
#[derive(Debug, Default)]
pub(crate) struct WriterStats {
    /// Reads served, synchronous and worker-side.
    reads: AtomicU64,
    /// Write operations applied (puts and deletes).
    writes: AtomicU64,
    /// Explicit write transactions begun.
    transactions_started: AtomicU64,
    /// Transactions committed, implicit batches included.
    commits: AtomicU64,
    /// Transactions aborted.
    aborts: AtomicU64,
}

impl WriterStats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_begin(&self) {
        self.transactions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_abort(&self) {
        self.aborts.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a point-in-time snapshot of the counters.
    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            transactions_started: self.transactions_started.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            aborts: self.aborts.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time view of the worker counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Reads served, synchronous and worker-side.
    pub reads: u64,
    /// Write operations applied (puts and deletes).
    pub writes: u64,
    /// Explicit write transactions begun.
    pub transactions_started: u64,
    /// Transactions committed, implicit batches included.
    pub commits: u64,
    /// Transactions aborted.
    pub aborts: u64,
}
