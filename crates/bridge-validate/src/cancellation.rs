use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// A cancellation scope shared by every layer an invocation passes through
/// (validator → resilience → executor → parser → stream publish), per §9
/// "Replacement for exceptions-as-control-flow" / "no non-local unwind".
///
/// Every blocking operation that should honor cancellation calls
/// [`CancellationScope::cancelled`] in a `select!` against its own work.
#[derive(Clone, Debug)]
pub struct CancellationScope {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl Default for CancellationScope {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationScope {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`Self::cancel`] has been called, for use in `select!`.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        // Avoid the race between the is_cancelled() check above and a
        // concurrent cancel(): register for notification first, then
        // re-check, following the standard Notify idiom.
        let notified = self.inner.notify.notified();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_wakes_pending_waiters() {
        let scope = CancellationScope::new();
        let waiter = scope.clone();
        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
        });
        tokio::task::yield_now().await;
        scope.cancel();
        handle.await.unwrap();
        assert!(scope.is_cancelled());
    }

    #[tokio::test]
    async fn already_cancelled_resolves_immediately() {
        let scope = CancellationScope::new();
        scope.cancel();
        scope.cancelled().await;
    }
}
