//! # WarrenDB Core
//!
//! An embedded, ordered key-value store for single-threaded cooperative
//! hosts, backed by a memory-mapped LMDB environment through `heed`.
//!
//! The engine requires that a write transaction be used only on the OS
//! thread that created it, with a single writer per environment. This
//! crate is the coordination layer that hides those rules from an
//! event-loop host:
//!
//! - A dedicated **write worker** thread owns every write transaction;
//!   writes and asynchronous reads are reified as messages on a command
//!   channel and resolved through awaitable [`Completion`] tokens.
//! - Contiguous writes outside an explicit transaction are coalesced
//!   into **implicit batches**, amortizing commit cost across bursts.
//! - A per-facade **read transaction slot** serves synchronous reads
//!   from a cached snapshot, advanced deliberately with
//!   [`Database::reset_read_txn`].
//!
//! ```rust,ignore
//! use warrendb_core::Database;
//!
//! let mut db = Database::open("./cache")?;
//! db.put("key", vec![1, 2, 3])?.await?;
//! assert_eq!(db.get_sync("key")?, Some(vec![1, 2, 3]));
//! db.close()?;
//! ```

#![warn(missing_docs)]

pub mod cache;
mod completion;
mod config;
mod database;
mod env;
mod error;
mod reader;
mod stats;
mod writer;

pub use completion::Completion;
pub use config::{Options, DEFAULT_MAP_SIZE};
pub use database::Database;
pub use env::{MAX_KEY_SIZE, MAX_VALUE_SIZE};
pub use error::{StoreError, StoreResult};
pub use stats::StatsSnapshot;
pub use writer::Entry;
