//! One-way cancellation latch with an optional reason.

use crate::errors::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;

/// A clonable cancellation latch shared between a job and its observers.
///
/// The latch moves from active to cancelled exactly once. The first latched
/// reason wins; later requests are no-ops. The token can be polled with
/// [`is_cancelled`](Self::is_cancelled) from any thread or awaited with
/// [`cancelled`](Self::cancelled).
#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<TokenState>,
}

#[derive(Debug)]
struct TokenState {
    cancelled: AtomicBool,
    reason: Mutex<Option<Error>>,
    notify: Notify,
}

impl CancelToken {
    /// Create a token in the active state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenState {
                cancelled: AtomicBool::new(false),
                reason: Mutex::new(None),
                notify: Notify::new(),
            }),
        }
    }

    /// Latch the token with the default [`Error::Canceled`] reason.
    pub fn cancel(&self) {
        self.cancel_with(Error::Canceled);
    }

    /// Latch the token with an explicit reason and wake all waiters.
    ///
    /// A token that is already latched keeps its original reason.
    pub fn cancel_with(&self, reason: Error) {
        let mut guard = self
            .inner
            .reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if guard.is_some() {
            return;
        }
        *guard = Some(reason);
        self.inner.cancelled.store(true, Ordering::SeqCst);
        drop(guard);
        self.inner.notify.notify_waiters();
    }

    /// Returns true once the token has been latched.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// The reason the token was latched with, if any.
    #[must_use]
    pub fn reason(&self) -> Option<Error> {
        self.inner
            .reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Wait until the token is latched.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }

        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
            if self.is_cancelled() {
                return;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latches_once_with_first_reason() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert_eq!(token.reason(), None);

        token.cancel_with(Error::Timeout);
        token.cancel_with(Error::CanceledByRunner);
        token.cancel();

        assert!(token.is_cancelled());
        assert_eq!(token.reason(), Some(Error::Timeout));
    }

    #[test]
    fn default_reason_is_canceled() {
        let token = CancelToken::new();
        token.cancel();
        assert_eq!(token.reason(), Some(Error::Canceled));
    }

    #[test]
    fn clones_share_the_latch() {
        let token = CancelToken::new();
        let observer = token.clone();
        token.cancel();
        assert!(observer.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_wakes_waiters() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let waiting = tokio::spawn(async move { waiter.cancelled().await });

        tokio::task::yield_now().await;
        token.cancel();

        waiting.await.expect("waiter join failed");
    }

    #[tokio::test]
    async fn cancelled_returns_immediately_when_latched() {
        let token = CancelToken::new();
        token.cancel();
        token.cancelled().await;
    }
}
