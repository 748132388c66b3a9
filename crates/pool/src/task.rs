//! The user-facing task contract.

use crate::cancel::CancelToken;
use crate::errors::{Error, Result};
use std::future::Future;
use std::pin::Pin;

/// Owned dynamically-typed future, as returned by [`Task::run`].
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A unit of work executed through a [`Job`](crate::Job).
///
/// `run` receives the job's cancellation token and should poll
/// [`CancelToken::is_cancelled`] at the granularity its caller is willing to
/// wait (or await [`CancelToken::cancelled`]). Cancellation is cooperative: a
/// task that ignores the token runs to completion, and only the observer
/// dispatch reflects the latched token.
///
/// The lifecycle observers default to no-ops; exactly one of them fires after
/// `run` returns:
///
/// - `on_cancel` when the token was latched by the time `run` returned,
///   whatever `run` returned;
/// - otherwise `on_error` for an `Err` outcome;
/// - otherwise `on_success` with the produced value.
///
/// Observers run on the executing worker, before the job's completion is
/// published. A task must not block in an observer on another job managed by
/// the same runner; that would hold the worker and can deadlock the pool.
pub trait Task: Send + 'static {
    /// Value produced by the task. `Default` supplies the result of queries
    /// made before the job ever ran; `Clone` makes the outcome re-readable.
    type Output: Clone + Default + Send + 'static;

    /// Perform the work.
    fn run(&mut self, cancel: CancelToken) -> BoxFuture<'_, Result<Self::Output>>;

    /// Observe the produced value after a successful run.
    fn on_success(&mut self, _value: &Self::Output) {}

    /// Observe the failure returned by `run`.
    fn on_error(&mut self, _error: &Error) {}

    /// Observe cancellation, with the reason the token was latched with.
    fn on_cancel(&mut self, _reason: &Error) {}
}
