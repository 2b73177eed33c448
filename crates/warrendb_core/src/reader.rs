//! Per-facade read transaction slot.

use crate::env::SharedEnv;
use crate::error::StoreResult;
use std::cell::RefCell;

/// Caches at most one read transaction for the facade's thread.
///
/// Creating a read transaction costs a system call; callers that issue
/// many synchronous reads start one here and advance it deliberately
/// with [`reset`](ReadSlot::reset) once they know a write has landed.
///
/// `heed::RoTxn` is `!Send`, so holding one makes the owning facade
/// `!Send` as well: a cached read transaction can never migrate to
/// another thread.
#[derive(Default)]
pub(crate) struct ReadSlot {
    txn: RefCell<Option<heed::RoTxn<'static>>>,
}

impl ReadSlot {
    /// Starts the cached read transaction. Idempotent: an existing
    /// transaction is reused.
    pub(crate) fn start(&self, shared: &SharedEnv) -> StoreResult<()> {
        let mut slot = self.txn.borrow_mut();
        if slot.is_none() {
            *slot = Some(shared.static_read_txn()?);
        }
        Ok(())
    }

    /// Ends the cached read transaction. Safe to call when none exists.
    pub(crate) fn end(&self) -> StoreResult<()> {
        if let Some(txn) = self.txn.borrow_mut().take() {
            txn.commit()?;
        }
        Ok(())
    }

    /// Renews the cached read transaction to observe the latest committed
    /// snapshot. A renew with no cached transaction is a no-op.
    pub(crate) fn reset(&self, shared: &SharedEnv) -> StoreResult<()> {
        let mut slot = self.txn.borrow_mut();
        if slot.take().is_some() {
            // Abort-and-recreate; the wrapper does not expose the
            // engine's native renew.
            *slot = Some(shared.static_read_txn()?);
        }
        Ok(())
    }

    /// Runs `f` under the cached transaction if one exists, otherwise
    /// under a short-lived transaction discarded afterwards.
    pub(crate) fn with_read_txn<R>(
        &self,
        shared: &SharedEnv,
        f: impl FnOnce(&heed::RoTxn<'_>) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let slot = self.txn.borrow();
        match slot.as_ref() {
            Some(txn) => f(txn),
            None => {
                let txn = shared.read_txn()?;
                let result = f(&txn)?;
                txn.commit()?;
                Ok(result)
            }
        }
    }

    /// Whether a read transaction is currently cached.
    pub(crate) fn is_active(&self) -> bool {
        self.txn.borrow().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use crate::env;
    use tempfile::tempdir;

    #[test]
    fn start_is_idempotent_and_end_is_safe() {
        let dir = tempdir().unwrap();
        let handle = env::acquire(dir.path(), &Options::default()).unwrap();
        let slot = ReadSlot::default();

        assert!(!slot.is_active());
        slot.end().unwrap();

        slot.start(&handle.shared).unwrap();
        slot.start(&handle.shared).unwrap();
        assert!(slot.is_active());

        slot.end().unwrap();
        assert!(!slot.is_active());
    }

    #[test]
    fn reset_without_a_transaction_is_a_no_op() {
        let dir = tempdir().unwrap();
        let handle = env::acquire(dir.path(), &Options::default()).unwrap();
        let slot = ReadSlot::default();

        slot.reset(&handle.shared).unwrap();
        assert!(!slot.is_active());
    }

    #[test]
    fn with_read_txn_falls_back_to_a_short_lived_transaction() {
        let dir = tempdir().unwrap();
        let handle = env::acquire(dir.path(), &Options::default()).unwrap();
        let slot = ReadSlot::default();

        let value = slot
            .with_read_txn(&handle.shared, |txn| handle.shared.get(txn, b"missing"))
            .unwrap();
        assert_eq!(value, None);
        assert!(!slot.is_active());
    }
}
