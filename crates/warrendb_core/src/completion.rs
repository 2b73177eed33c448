//! Completion bridge between the write worker and the host scheduler.
//!
//! Every asynchronous command carries a [`Resolver`]; the matching
//! [`Completion`] is the token the host awaits. The worker blocks freely
//! on engine calls and resolves tokens when a command's outcome is known,
//! so the host's event loop never stalls on the engine.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{StoreError, StoreResult};

/// Host-side handle for an asynchronous operation.
///
/// Resolves once the write worker has executed the command (for writes,
/// once the enclosing transaction has committed). Dropping a `Completion`
/// does not cancel the command; the worker still executes it.
#[derive(Debug)]
pub struct Completion<T> {
    rx: oneshot::Receiver<StoreResult<T>>,
}

impl<T> Completion<T> {
    /// Blocks the current thread until the command resolves.
    ///
    /// Intended for synchronous hosts and tests. Must not be called from
    /// an async context; use `.await` there instead.
    pub fn wait(self) -> StoreResult<T> {
        match self.rx.blocking_recv() {
            Ok(result) => result,
            Err(_) => Err(StoreError::WorkerDead),
        }
    }
}

impl<T> Future for Completion<T> {
    type Output = StoreResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // The worker dropped the resolver without resolving it.
            Poll::Ready(Err(_)) => Poll::Ready(Err(StoreError::WorkerDead)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Worker-side half of a [`Completion`].
#[derive(Debug)]
pub(crate) struct Resolver<T> {
    tx: oneshot::Sender<StoreResult<T>>,
}

impl<T> Resolver<T> {
    /// Resolves the paired completion token.
    ///
    /// The host may already have dropped its token; a dead receiver is
    /// not an error.
    pub(crate) fn resolve(self, result: StoreResult<T>) {
        let _ = self.tx.send(result);
    }
}

/// Creates a linked resolver/completion pair.
pub(crate) fn channel<T>() -> (Resolver<T>, Completion<T>) {
    let (tx, rx) = oneshot::channel();
    (Resolver { tx }, Completion { rx })
}
