//! Compatibility surface for bundler cache integrations.
//!
//! Bundler caches expect a narrow API: synchronous `get`, asynchronous
//! `put`, and an explicit way to advance the read snapshot after writes
//! land. [`CacheStore`] adapts [`Database`] to that shape with string
//! keys and opaque byte values.

use crate::completion::Completion;
use crate::config::Options;
use crate::database::Database;
use crate::error::StoreResult;
use std::path::Path;

/// Options accepted by [`CacheStore::open`] for API compatibility.
///
/// `name`, `encoding` and `compression` are accepted but not
/// interpreted: the store uses a single default key space and treats
/// values as opaque bytes. Compression is an engine-level concern.
#[derive(Debug, Clone, Default)]
pub struct CacheOptions {
    /// Sub-cache name; currently unused.
    pub name: Option<String>,
    /// Value encoding hint; currently unused.
    pub encoding: Option<String>,
    /// Compression hint; currently unused.
    pub compression: Option<String>,
}

/// A string-keyed cache over a [`Database`].
///
/// Opens with a cached read transaction already started, so consecutive
/// `get`s share one snapshot; call
/// [`reset_read_txn`](CacheStore::reset_read_txn) after awaited writes
/// to observe them.
pub struct CacheStore {
    db: Database,
}

impl CacheStore {
    /// Opens (or creates) the cache directory.
    pub fn open(dir: impl AsRef<Path>, _options: CacheOptions) -> StoreResult<Self> {
        let db = Database::open_with_options(dir, Options::default())?;
        db.start_read_transaction()?;
        Ok(Self { db })
    }

    /// Reads a cache entry synchronously.
    pub fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.db.get_sync(key)
    }

    /// Writes a cache entry; resolves once committed.
    pub fn put(&self, key: &str, value: impl Into<Vec<u8>>) -> StoreResult<Completion<()>> {
        self.db.put(key, value)
    }

    /// Advances the read snapshot to the latest committed state.
    pub fn reset_read_txn(&self) -> StoreResult<()> {
        self.db.reset_read_txn()
    }

    /// The underlying database handle.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }
}
