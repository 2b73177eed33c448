//! Write worker: the sole owner of write transactions.
//!
//! Every write and every asynchronous read is reified as a [`Command`] on
//! a multi-producer, single-consumer queue. One dedicated OS thread
//! consumes the queue, so the engine's rules (a write transaction is
//! used only on its creating thread, with one writer per environment)
//! hold structurally rather than by locking.
//!
//! Outside an explicit `Begin`..`Commit` window the worker coalesces
//! contiguous writes into an implicit transaction and commits when the
//! queue momentarily empties, amortizing commit cost across bursts.

use crate::completion::Resolver;
use crate::env::SharedEnv;
use crate::error::{StoreError, StoreResult};
use crate::stats::WriterStats;
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;

/// A single key/value pair for vectored writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Key bytes; non-empty and at most [`MAX_KEY_SIZE`](crate::MAX_KEY_SIZE).
    pub key: Vec<u8>,
    /// Value bytes; opaque to the store.
    pub value: Vec<u8>,
}

/// Commands consumed by the write worker.
pub(crate) enum Command {
    /// Single-key write. `resolve` is `None` for fire-and-forget puts,
    /// whose outcome is reported by the enclosing window's commit.
    Put {
        key: Vec<u8>,
        value: Vec<u8>,
        resolve: Option<Resolver<()>>,
    },
    /// Vectored write; atomic within the enclosing transaction.
    PutMany {
        entries: Vec<Entry>,
        resolve: Resolver<()>,
    },
    /// Remove a key.
    Delete {
        key: Vec<u8>,
        resolve: Resolver<()>,
    },
    /// Read executed on the worker thread.
    Get {
        key: Vec<u8>,
        resolve: Resolver<Option<Vec<u8>>>,
    },
    /// Begin an explicit write transaction.
    Begin { resolve: Resolver<()> },
    /// Commit the explicit write transaction.
    Commit { resolve: Resolver<()> },
    /// Abort the explicit write transaction.
    Abort { resolve: Resolver<()> },
    /// Drain and exit.
    Shutdown,
}

/// Owning handle for the worker thread.
///
/// Sends [`Command::Shutdown`] and joins the thread on drop, so the last
/// facade to let go of an environment tears the worker down before the
/// engine closes.
pub(crate) struct WriterHandle {
    tx: Sender<Command>,
    thread: Option<JoinHandle<()>>,
}

impl WriterHandle {
    /// Enqueues a command. Never blocks; the queue is unbounded.
    pub(crate) fn send(&self, command: Command) -> StoreResult<()> {
        self.tx.send(command).map_err(|_| StoreError::WorkerDead)
    }
}

impl Drop for WriterHandle {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Spawns the write worker for an environment.
pub(crate) fn spawn(
    shared: Arc<SharedEnv>,
    stats: Arc<WriterStats>,
    max_batch_writes: Option<usize>,
) -> StoreResult<WriterHandle> {
    let (tx, rx) = std::sync::mpsc::channel();
    let thread = std::thread::Builder::new()
        .name("warrendb-writer".into())
        .spawn(move || Worker::new(&shared, &stats, max_batch_writes).run(&rx))
        .map_err(|err| StoreError::open(format!("failed to spawn write worker: {err}")))?;
    Ok(WriterHandle {
        tx,
        thread: Some(thread),
    })
}

struct Worker<'env> {
    shared: &'env SharedEnv,
    stats: &'env WriterStats,
    /// The current write transaction, implicit or explicit.
    txn: Option<heed::RwTxn<'env>>,
    /// Whether `txn` belongs to an explicit `Begin`..`Commit` window.
    explicit: bool,
    /// Error that aborted the current explicit window; re-reported by the
    /// eventual `Commit`.
    poisoned: Option<StoreError>,
    /// Resolvers of every write in the open transaction, enqueue order.
    pending: Vec<Resolver<()>>,
    /// Writes applied to the current implicit batch.
    batched: usize,
    max_batch_writes: Option<usize>,
}

impl<'env> Worker<'env> {
    fn new(
        shared: &'env SharedEnv,
        stats: &'env WriterStats,
        max_batch_writes: Option<usize>,
    ) -> Self {
        Self {
            shared,
            stats,
            txn: None,
            explicit: false,
            poisoned: None,
            pending: Vec::new(),
            batched: 0,
            max_batch_writes,
        }
    }

    fn run(mut self, rx: &Receiver<Command>) {
        tracing::debug!("write worker started");
        loop {
            let command = if self.txn.is_some() && !self.explicit {
                // An implicit batch is open: drain without blocking and
                // commit as soon as the queue momentarily empties.
                match rx.try_recv() {
                    Ok(command) => command,
                    Err(TryRecvError::Empty) => {
                        self.commit_current();
                        match rx.recv() {
                            Ok(command) => command,
                            Err(_) => break,
                        }
                    }
                    Err(TryRecvError::Disconnected) => break,
                }
            } else {
                match rx.recv() {
                    Ok(command) => command,
                    Err(_) => break,
                }
            };

            if !self.handle(command) {
                break;
            }
        }
        self.drain();
        tracing::debug!("write worker stopped");
    }

    /// Handles one command; returns false when the worker should exit.
    fn handle(&mut self, command: Command) -> bool {
        match command {
            // A fire-and-forget put is only meaningful inside an explicit
            // window; see the facade's enqueue-order check.
            Command::Put { resolve: None, .. } if !self.explicit => {
                tracing::warn!("dropping unconfirmed put outside a write transaction");
            }
            Command::Put {
                key,
                value,
                resolve,
            } => self.write(resolve, |shared, txn| shared.put(txn, &key, &value)),
            Command::PutMany { entries, resolve } => {
                self.write(Some(resolve), |shared, txn| {
                    for entry in &entries {
                        shared.put(txn, &entry.key, &entry.value)?;
                    }
                    Ok(())
                });
            }
            Command::Delete { key, resolve } => {
                self.write(Some(resolve), |shared, txn| shared.delete(txn, &key));
            }
            Command::Get { key, resolve } => self.get(&key, resolve),
            Command::Begin { resolve } => self.begin(resolve),
            Command::Commit { resolve } => self.commit(resolve),
            Command::Abort { resolve } => self.abort(resolve),
            Command::Shutdown => return false,
        }
        true
    }

    /// Applies one write command inside the current transaction, opening
    /// an implicit one if none is open.
    fn write(
        &mut self,
        resolve: Option<Resolver<()>>,
        apply: impl FnOnce(&SharedEnv, &mut heed::RwTxn<'env>) -> StoreResult<()>,
    ) {
        if let Some(err) = &self.poisoned {
            // The explicit window already failed; reject until it closes.
            if let Some(resolve) = resolve {
                resolve.resolve(Err(err.clone()));
            }
            return;
        }

        if self.txn.is_none() {
            match self.shared.env.write_txn() {
                Ok(txn) => self.txn = Some(txn),
                Err(err) => {
                    let err = StoreError::from(err);
                    if let Some(resolve) = resolve {
                        resolve.resolve(Err(err));
                    }
                    return;
                }
            }
        }

        let result = match self.txn.as_mut() {
            Some(txn) => apply(self.shared, txn),
            // Only reachable if transaction creation failed above.
            None => return,
        };

        match result {
            Ok(()) => {
                self.stats.record_write();
                if let Some(resolve) = resolve {
                    self.pending.push(resolve);
                }
                self.batched += 1;
                if !self.explicit && self.max_batch_writes.is_some_and(|limit| self.batched >= limit)
                {
                    self.commit_current();
                }
            }
            Err(err) => self.fail_current(err, resolve),
        }
    }

    /// Serves a read on the worker thread. A non-write command closes the
    /// implicit batch first; inside an explicit window the read observes
    /// the window's own uncommitted writes.
    fn get(&mut self, key: &[u8], resolve: Resolver<Option<Vec<u8>>>) {
        if !self.explicit {
            self.commit_current();
        }
        self.stats.record_read();
        let result = match &self.txn {
            Some(txn) => self.shared.get(txn, key),
            None => self.shared.read(key),
        };
        resolve.resolve(result);
    }

    fn begin(&mut self, resolve: Resolver<()>) {
        if self.explicit {
            resolve.resolve(Err(StoreError::TransactionAlreadyOpen));
            return;
        }
        // Flush any implicit batch before the window opens.
        self.commit_current();
        match self.shared.env.write_txn() {
            Ok(txn) => {
                self.txn = Some(txn);
                self.explicit = true;
                self.stats.record_begin();
                resolve.resolve(Ok(()));
            }
            Err(err) => resolve.resolve(Err(err.into())),
        }
    }

    fn commit(&mut self, resolve: Resolver<()>) {
        if !self.explicit {
            resolve.resolve(Err(StoreError::NoTransaction));
            return;
        }
        self.explicit = false;
        if let Some(err) = self.poisoned.take() {
            // The window already aborted; report why.
            resolve.resolve(Err(err));
            return;
        }
        let Some(txn) = self.txn.take() else {
            resolve.resolve(Err(StoreError::NoTransaction));
            return;
        };
        self.batched = 0;
        match txn.commit() {
            Ok(()) => {
                self.stats.record_commit();
                for pending in self.pending.drain(..) {
                    pending.resolve(Ok(()));
                }
                resolve.resolve(Ok(()));
            }
            Err(err) => {
                let err = StoreError::from(err);
                tracing::warn!(error = %err, "explicit commit failed");
                self.fail_pending(&err);
                resolve.resolve(Err(err));
            }
        }
    }

    fn abort(&mut self, resolve: Resolver<()>) {
        if !self.explicit {
            resolve.resolve(Err(StoreError::NoTransaction));
            return;
        }
        self.explicit = false;
        self.poisoned = None;
        self.batched = 0;
        if let Some(txn) = self.txn.take() {
            txn.abort();
            self.stats.record_abort();
        }
        self.fail_pending(&StoreError::aborted());
        resolve.resolve(Ok(()));
    }

    /// Commits the open transaction and resolves every participating
    /// command in enqueue order.
    fn commit_current(&mut self) {
        let Some(txn) = self.txn.take() else { return };
        self.batched = 0;
        match txn.commit() {
            Ok(()) => {
                self.stats.record_commit();
                for pending in self.pending.drain(..) {
                    pending.resolve(Ok(()));
                }
            }
            Err(err) => {
                let err = StoreError::from(err);
                tracing::warn!(error = %err, "implicit batch commit failed");
                self.fail_pending(&err);
            }
        }
    }

    /// Aborts the open transaction and fans the error out to the failing
    /// command and every command pending in the transaction.
    fn fail_current(&mut self, err: StoreError, resolve: Option<Resolver<()>>) {
        if let Some(txn) = self.txn.take() {
            txn.abort();
            self.stats.record_abort();
        }
        self.batched = 0;
        tracing::warn!(error = %err, "write transaction aborted");
        self.fail_pending(&err);
        if let Some(resolve) = resolve {
            resolve.resolve(Err(err.clone()));
        }
        if self.explicit {
            // Latch so the eventual commit reports the same failure.
            self.poisoned = Some(err);
        }
    }

    fn fail_pending(&mut self, err: &StoreError) {
        for pending in self.pending.drain(..) {
            pending.resolve(Err(err.clone()));
        }
    }

    /// Shutdown: an implicit batch commits, an explicit window aborts
    /// with `Closed` fanned to its pending commands.
    fn drain(&mut self) {
        if self.explicit {
            if let Some(txn) = self.txn.take() {
                txn.abort();
                self.stats.record_abort();
            }
            self.fail_pending(&StoreError::Closed);
        } else {
            self.commit_current();
        }
    }
}
