//! Environment configuration.

/// Default maximum size of the memory-mapped data file: 50 GiB.
///
/// The map size is an address-space reservation, not an allocation; the
/// data file grows as pages are actually written.
pub const DEFAULT_MAP_SIZE: usize = 50 * 1024 * 1024 * 1024;

/// Configuration for opening an environment.
///
/// Immutable after open. Re-opening a path that is already open in this
/// process must use the same `map_size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Maximum size of the memory-mapped data file, in bytes.
    pub map_size: usize,

    /// If true, commits may return before the engine has fsynced them,
    /// trading durability for write throughput.
    pub async_writes: bool,

    /// Soft bound on uncommitted writes in an implicit batch. `None`
    /// (the default) commits only when the command queue empties.
    pub max_batch_writes: Option<usize>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            map_size: DEFAULT_MAP_SIZE,
            async_writes: false,
            max_batch_writes: None,
        }
    }
}

impl Options {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum size of the memory map.
    #[must_use]
    pub const fn map_size(mut self, size: usize) -> Self {
        self.map_size = size;
        self
    }

    /// Sets whether commits may return before fsync completes.
    #[must_use]
    pub const fn async_writes(mut self, value: bool) -> Self {
        self.async_writes = value;
        self
    }

    /// Sets the soft bound on uncommitted writes per implicit batch.
    #[must_use]
    pub const fn max_batch_writes(mut self, limit: usize) -> Self {
        self.max_batch_writes = Some(limit);
        self
    }
}
