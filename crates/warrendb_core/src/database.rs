//! Database facade.

use crate::completion::{self, Completion};
use crate::config::Options;
use crate::env::{self, EnvHandle};
use crate::error::{StoreError, StoreResult};
use crate::reader::ReadSlot;
use crate::stats::StatsSnapshot;
use crate::writer::{Command, Entry};
use std::cell::Cell;
use std::path::Path;
use std::sync::Arc;

/// The host-visible database handle.
///
/// `Database` is a single-threaded object built for cooperative hosts:
/// synchronous reads run inline against a cached read transaction, while
/// writes and asynchronous reads are enqueued to the environment's write
/// worker and resolved through [`Completion`] tokens the host awaits.
/// The handle is `!Send` (its cached read transaction is bound to the
/// creating thread) but completions may be awaited anywhere.
///
/// Opening the same directory twice in one process yields facades that
/// share a single underlying environment and write worker.
///
/// # Example
///
/// ```rust,ignore
/// use warrendb_core::Database;
///
/// let mut db = Database::open("./cache")?;
/// db.put("key", vec![1, 2, 3])?.await?;
/// assert_eq!(db.get_sync("key")?, Some(vec![1, 2, 3]));
/// db.close()?;
/// ```
pub struct Database {
    inner: Option<Arc<EnvHandle>>,
    slot: ReadSlot,
    /// Whether an explicit write window has been enqueued and not yet
    /// closed. Commands are FIFO, so enqueue order alone decides whether
    /// a fire-and-forget put lands inside the window.
    write_window: Cell<bool>,
}

impl Database {
    /// Opens the database directory with default options.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with_options(path, Options::default())
    }

    /// Opens the database directory with the given options.
    ///
    /// The directory is created if missing. Fails with
    /// [`StoreError::Open`] on I/O errors, an invalid path, or a
    /// `map_size` conflicting with an already-open environment.
    pub fn open_with_options(path: impl AsRef<Path>, options: Options) -> StoreResult<Self> {
        let inner = env::acquire(path.as_ref(), &options)?;
        Ok(Self {
            inner: Some(inner),
            slot: ReadSlot::default(),
            write_window: Cell::new(false),
        })
    }

    fn handle(&self) -> StoreResult<&Arc<EnvHandle>> {
        self.inner.as_ref().ok_or(StoreError::Closed)
    }

    /// Reads a key on the worker thread; resolves with the value or
    /// `None`.
    pub fn get(&self, key: impl Into<Vec<u8>>) -> StoreResult<Completion<Option<Vec<u8>>>> {
        let handle = self.handle()?;
        let (resolve, pending) = completion::channel();
        handle.writer.send(Command::Get {
            key: key.into(),
            resolve,
        })?;
        Ok(pending)
    }

    /// Reads a key inline, without suspending.
    ///
    /// Runs under the cached read transaction if one was started,
    /// otherwise under a fresh snapshot, which observes every write
    /// whose completion resolved before this call.
    pub fn get_sync(&self, key: impl AsRef<[u8]>) -> StoreResult<Option<Vec<u8>>> {
        let handle = self.handle()?;
        handle.stats.record_read();
        self.slot
            .with_read_txn(&handle.shared, |txn| handle.shared.get(txn, key.as_ref()))
    }

    /// Reads several keys on the worker thread, resolving with one value
    /// per key in order.
    pub async fn get_many(&self, keys: Vec<Vec<u8>>) -> StoreResult<Vec<Option<Vec<u8>>>> {
        let mut pendings = Vec::with_capacity(keys.len());
        for key in keys {
            pendings.push(self.get(key)?);
        }
        let mut values = Vec::with_capacity(pendings.len());
        for pending in pendings {
            values.push(pending.await?);
        }
        Ok(values)
    }

    /// Reads several keys inline under a single snapshot.
    pub fn get_many_sync(&self, keys: &[Vec<u8>]) -> StoreResult<Vec<Option<Vec<u8>>>> {
        let handle = self.handle()?;
        handle.stats.record_read();
        self.slot.with_read_txn(&handle.shared, |txn| {
            keys.iter()
                .map(|key| handle.shared.get(txn, key))
                .collect()
        })
    }

    /// Writes a key; the completion resolves once the enclosing
    /// transaction (explicit window or implicit batch) has committed.
    pub fn put(
        &self,
        key: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
    ) -> StoreResult<Completion<()>> {
        let handle = self.handle()?;
        let (resolve, pending) = completion::channel();
        handle.writer.send(Command::Put {
            key: key.into(),
            value: value.into(),
            resolve: Some(resolve),
        })?;
        Ok(pending)
    }

    /// Writes several keys atomically within one transaction.
    pub fn put_many(&self, entries: Vec<Entry>) -> StoreResult<Completion<()>> {
        let handle = self.handle()?;
        let (resolve, pending) = completion::channel();
        handle.writer.send(Command::PutMany { entries, resolve })?;
        Ok(pending)
    }

    /// Fire-and-forget write inside an explicit write transaction.
    ///
    /// Produces no completion: the next confirmed command, typically
    /// [`commit_write_transaction`](Self::commit_write_transaction),
    /// transitively acknowledges it, and any engine error it hits is
    /// latched onto the transaction and reported at commit. Outside a
    /// write transaction this fails with [`StoreError::NoTransaction`].
    pub fn put_no_confirm(
        &self,
        key: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
    ) -> StoreResult<()> {
        let handle = self.handle()?;
        if !self.write_window.get() {
            return Err(StoreError::NoTransaction);
        }
        handle.writer.send(Command::Put {
            key: key.into(),
            value: value.into(),
            resolve: None,
        })
    }

    /// Removes a key; resolves on commit of the enclosing transaction.
    pub fn delete(&self, key: impl Into<Vec<u8>>) -> StoreResult<Completion<()>> {
        let handle = self.handle()?;
        let (resolve, pending) = completion::channel();
        handle.writer.send(Command::Delete {
            key: key.into(),
            resolve,
        })?;
        Ok(pending)
    }

    /// Begins an explicit write transaction; resolves once the worker
    /// has opened it. Fails with [`StoreError::TransactionAlreadyOpen`]
    /// when one is already open.
    pub fn start_write_transaction(&self) -> StoreResult<Completion<()>> {
        let handle = self.handle()?;
        if self.write_window.get() {
            return Err(StoreError::TransactionAlreadyOpen);
        }
        let (resolve, pending) = completion::channel();
        handle.writer.send(Command::Begin { resolve })?;
        self.write_window.set(true);
        Ok(pending)
    }

    /// Commits the explicit write transaction; resolves after the commit
    /// with its outcome. Fails with [`StoreError::NoTransaction`] when
    /// none is open.
    pub fn commit_write_transaction(&self) -> StoreResult<Completion<()>> {
        let handle = self.handle()?;
        if !self.write_window.get() {
            return Err(StoreError::NoTransaction);
        }
        let (resolve, pending) = completion::channel();
        handle.writer.send(Command::Commit { resolve })?;
        self.write_window.set(false);
        Ok(pending)
    }

    /// Aborts the explicit write transaction, discarding its writes.
    pub fn abort_write_transaction(&self) -> StoreResult<Completion<()>> {
        let handle = self.handle()?;
        if !self.write_window.get() {
            return Err(StoreError::NoTransaction);
        }
        let (resolve, pending) = completion::channel();
        handle.writer.send(Command::Abort { resolve })?;
        self.write_window.set(false);
        Ok(pending)
    }

    /// Starts the cached read transaction for this facade. Idempotent.
    ///
    /// Until [`commit_read_transaction`](Self::commit_read_transaction)
    /// or [`reset_read_txn`](Self::reset_read_txn), synchronous reads
    /// observe the snapshot taken here.
    pub fn start_read_transaction(&self) -> StoreResult<()> {
        let handle = self.handle()?;
        self.slot.start(&handle.shared)
    }

    /// Ends the cached read transaction. Safe to call when none exists.
    pub fn commit_read_transaction(&self) -> StoreResult<()> {
        self.handle()?;
        self.slot.end()
    }

    /// Renews the cached read transaction to observe the latest committed
    /// snapshot. A renew with no cached transaction is a no-op.
    pub fn reset_read_txn(&self) -> StoreResult<()> {
        let handle = self.handle()?;
        self.slot.reset(&handle.shared)
    }

    /// Closes this facade. Idempotent.
    ///
    /// The cached read transaction ends immediately. When this is the
    /// last facade on the path, the write worker drains its queue, the
    /// thread is joined, and the environment closes. Every later
    /// operation on this handle fails with [`StoreError::Closed`].
    pub fn close(&mut self) -> StoreResult<()> {
        if self.inner.is_none() {
            return Ok(());
        }
        let result = self.slot.end();
        self.inner = None;
        result
    }

    /// Whether this facade is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    /// Returns a snapshot of the environment's operation counters.
    pub fn stats(&self) -> StoreResult<StatsSnapshot> {
        Ok(self.handle()?.stats.snapshot())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("is_open", &self.is_open())
            .field("read_transaction", &self.slot.is_active())
            .finish_non_exhaustive()
    }
}


/// Persistence tests that exercise reopening on-disk environments.
#[cfg(test)]
mod persistence_tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn values_survive_reopen() {
        let dir = tempdir().unwrap();

        {
            let mut db = Database::open(dir.path()).unwrap();
            db.put("durable", vec![4, 5, 6]).unwrap().await.unwrap();
            db.close().unwrap();
        }

        let db = Database::open(dir.path()).unwrap();
        assert_eq!(db.get_sync("durable").unwrap(), Some(vec![4, 5, 6]));
    }

    #[tokio::test]
    async fn facades_on_one_path_share_the_worker() {
        let dir = tempdir().unwrap();
        let a = Database::open(dir.path()).unwrap();
        let b = Database::open(dir.path()).unwrap();

        a.put("shared", vec![1]).unwrap().await.unwrap();
        assert_eq!(b.get_sync("shared").unwrap(), Some(vec![1]));
    }
}
