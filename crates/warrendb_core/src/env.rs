//! Engine handle: environment opening, per-path deduplication, teardown.

use crate::config::Options;
use crate::error::{StoreError, StoreResult};
use crate::stats::WriterStats;
use crate::writer::{self, WriterHandle};
use heed::types::Bytes;
use heed::{EnvFlags, EnvOpenOptions};
use lazy_static::lazy_static;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

/// Maximum key size accepted by the engine, in bytes.
pub const MAX_KEY_SIZE: usize = 511;

/// Maximum value size accepted by the engine, in bytes.
pub const MAX_VALUE_SIZE: usize = u32::MAX as usize;

/// The opened environment and its default key space.
///
/// Shared by reference between every facade on the path and the write
/// worker. All access goes through engine transactions; the struct itself
/// carries no mutable state.
pub(crate) struct SharedEnv {
    pub(crate) env: heed::Env,
    db: heed::Database<Bytes, Bytes>,
    map_size: usize,
}

impl SharedEnv {
    fn open(path: &Path, options: &Options) -> StoreResult<Self> {
        let env = unsafe {
            let mut flags = EnvFlags::empty();
            flags.set(EnvFlags::MAP_ASYNC, options.async_writes);
            flags.set(EnvFlags::NO_SYNC, options.async_writes);
            flags.set(EnvFlags::NO_META_SYNC, options.async_writes);
            EnvOpenOptions::new()
                .map_size(options.map_size)
                .flags(flags)
                .open(path)
        }
        .map_err(|err| StoreError::open(err.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|err| StoreError::open(err.to_string()))?;
        let db = env
            .create_database(&mut wtxn, None)
            .map_err(|err| StoreError::open(err.to_string()))?;
        wtxn.commit().map_err(|err| StoreError::open(err.to_string()))?;

        tracing::debug!(path = %path.display(), "opened environment");
        Ok(Self {
            env,
            db,
            map_size: options.map_size,
        })
    }

    /// Looks up `key` under an existing transaction, copying the value
    /// out of the map.
    pub(crate) fn get(&self, txn: &heed::RoTxn<'_>, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.db.get(txn, key)?.map(<[u8]>::to_vec))
    }

    /// Looks up `key` under a fresh short-lived read transaction.
    pub(crate) fn read(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let txn = self.read_txn()?;
        let value = self.get(&txn, key)?;
        txn.commit()?;
        Ok(value)
    }

    pub(crate) fn put(
        &self,
        txn: &mut heed::RwTxn<'_>,
        key: &[u8],
        value: &[u8],
    ) -> StoreResult<()> {
        check_key(key)?;
        check_value(value)?;
        self.db.put(txn, key, value)?;
        Ok(())
    }

    pub(crate) fn delete(&self, txn: &mut heed::RwTxn<'_>, key: &[u8]) -> StoreResult<()> {
        check_key(key)?;
        self.db.delete(txn, key)?;
        Ok(())
    }

    pub(crate) fn read_txn(&self) -> StoreResult<heed::RoTxn<'_>> {
        Ok(self.env.read_txn()?)
    }

    /// A read transaction that owns its environment reference, suitable
    /// for caching in the read slot.
    pub(crate) fn static_read_txn(&self) -> StoreResult<heed::RoTxn<'static>> {
        Ok(self.env.clone().static_read_txn()?)
    }
}

fn check_key(key: &[u8]) -> StoreResult<()> {
    if key.is_empty() {
        return Err(StoreError::engine("keys must be non-empty"));
    }
    if key.len() > MAX_KEY_SIZE {
        return Err(StoreError::KeyTooLarge {
            size: key.len(),
            max: MAX_KEY_SIZE,
        });
    }
    Ok(())
}

fn check_value(value: &[u8]) -> StoreResult<()> {
    if value.len() > MAX_VALUE_SIZE {
        return Err(StoreError::ValueTooLarge { size: value.len() });
    }
    Ok(())
}

/// Per-path engine state shared by every facade opened on that path:
/// the environment plus the single write worker that serializes all
/// writes to it.
///
/// Dropping the last handle sends `Shutdown` to the worker, joins its
/// thread, and closes the environment once the final reference is gone.
pub(crate) struct EnvHandle {
    pub(crate) shared: Arc<SharedEnv>,
    pub(crate) writer: WriterHandle,
    pub(crate) stats: Arc<WriterStats>,
}

lazy_static! {
    /// Live environments by canonicalized path. Entries are weak: the
    /// registry never keeps an environment alive, it only ensures a path
    /// is opened at most once per process. Dead entries are replaced on
    /// the next open of the same path.
    static ref REGISTRY: Mutex<HashMap<PathBuf, Weak<EnvHandle>>> = Mutex::new(HashMap::new());
}

/// Opens (or joins) the environment at `path`.
///
/// Re-opening a live path returns a handle to the same environment and
/// worker; the requested `map_size` must agree with the live one.
pub(crate) fn acquire(path: &Path, options: &Options) -> StoreResult<Arc<EnvHandle>> {
    std::fs::create_dir_all(path)
        .map_err(|err| StoreError::open(format!("{}: {err}", path.display())))?;
    let canonical = path
        .canonicalize()
        .map_err(|err| StoreError::open(format!("{}: {err}", path.display())))?;

    let mut registry = REGISTRY.lock();
    if let Some(existing) = registry.get(&canonical).and_then(Weak::upgrade) {
        if existing.shared.map_size != options.map_size {
            return Err(StoreError::open(format!(
                "environment at {} is already open with map_size {}",
                canonical.display(),
                existing.shared.map_size
            )));
        }
        return Ok(existing);
    }

    let shared = Arc::new(SharedEnv::open(&canonical, options)?);
    let stats = Arc::new(WriterStats::new());
    let writer = writer::spawn(
        Arc::clone(&shared),
        Arc::clone(&stats),
        options.max_batch_writes,
    )?;
    let handle = Arc::new(EnvHandle {
        shared,
        writer,
        stats,
    });
    registry.insert(canonical, Arc::downgrade(&handle));
    Ok(handle)
}
