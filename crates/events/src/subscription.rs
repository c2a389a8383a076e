//! Disposable handle for a background subscription task.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handle to a running subscription.
///
/// Cancelling (explicitly or by dropping the handle) stops callback
/// delivery and releases the task's change receiver.
#[must_use = "dropping a Subscription cancels it immediately"]
pub struct Subscription {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn new(cancel: CancellationToken, handle: JoinHandle<()>) -> Self {
        Self { cancel, handle }
    }

    /// Stop delivery.
    ///
    /// The task checks for cancellation before every callback, so at most
    /// one callback that already passed that check may still run after
    /// this returns. Use [`Subscription::shutdown`] when no callback may
    /// run afterwards.
    pub fn unsubscribe(self) {
        self.cancel.cancel();
    }

    /// Whether the background task is still delivering.
    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled() && !self.handle.is_finished()
    }

    /// Cancel and wait for the background task to exit. Once this returns
    /// the callback has been dropped and never runs again.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Err(e) = (&mut self.handle).await {
            tracing::warn!(error = %e, "Subscription task ended abnormally");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
