//! One-shot job handles.

use crate::cancel::CancelToken;
use crate::errors::{Error, Result};
use crate::task::Task;
use futures_util::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use uuid::Uuid;

/// Execution phase of a job. Transitions are one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Fresh,
    Started,
    Done,
}

struct JobState<T> {
    phase: Phase,
    task: Option<Box<dyn Task<Output = T>>>,
    outcome: Option<Result<T>>,
}

struct JobInner<T> {
    id: Uuid,
    cancel: CancelToken,
    state: Mutex<JobState<T>>,
    done: Notify,
}

impl<T> JobInner<T> {
    fn lock_state(&self) -> MutexGuard<'_, JobState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A one-shot handle around a single [`Task`].
///
/// The handle owns the task until it is started, carries a process-unique v4
/// identifier, and drives the task through `Fresh -> Started -> Done` exactly
/// once. When the task returns, exactly one lifecycle observer fires
/// (cancellation dominating error, error dominating success) and only then is
/// completion published to [`wait`](Self::wait) and [`result`](Self::result).
///
/// Handles are cheap to clone; every clone observes the same job.
pub struct Job<T> {
    inner: Arc<JobInner<T>>,
}

impl<T> Clone for Job<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Job<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Job")
            .field("id", &self.inner.id)
            .field("phase", &self.inner.lock_state().phase)
            .finish_non_exhaustive()
    }
}

impl<T> Job<T>
where
    T: Clone + Default + Send + 'static,
{
    /// Wrap a task into a fresh job with a new identifier.
    #[must_use]
    pub fn new(task: impl Task<Output = T>) -> Self {
        Self {
            inner: Arc::new(JobInner {
                id: Uuid::new_v4(),
                cancel: CancelToken::new(),
                state: Mutex::new(JobState {
                    phase: Phase::Fresh,
                    task: Some(Box::new(task)),
                    outcome: None,
                }),
                done: Notify::new(),
            }),
        }
    }

    /// The job identifier, stable over the job's lifetime.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Start the task in the background.
    ///
    /// Only the first call dispatches the task; every later call is a no-op
    /// whatever the current phase. Must be called from within a tokio
    /// runtime.
    pub fn run(&self) {
        let task = {
            let mut state = self.inner.lock_state();
            if state.phase != Phase::Fresh {
                return;
            }
            state.phase = Phase::Started;
            state.task.take()
        };

        let Some(task) = task else { return };
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            drive(&inner, task).await;
        });
    }

    /// Block until the job is done.
    ///
    /// Returns immediately when [`run`](Self::run) was never called.
    pub async fn wait(&self) {
        if self.phase() == Phase::Fresh {
            return;
        }

        loop {
            let notified = self.inner.done.notified();
            if self.phase() == Phase::Done {
                return;
            }
            notified.await;
        }
    }

    /// The task outcome. Blocks until the job is done.
    ///
    /// When [`run`](Self::run) was never called this returns
    /// `Ok(T::default())` without blocking. The recorded outcome can be read
    /// any number of times, and is kept as the task returned it even when the
    /// job was cancelled.
    pub async fn result(&self) -> Result<T> {
        match self.phase() {
            Phase::Fresh => return Ok(T::default()),
            Phase::Started => self.wait().await,
            Phase::Done => {}
        }

        let state = self.inner.lock_state();
        match &state.outcome {
            Some(outcome) => outcome.clone(),
            None => Ok(T::default()),
        }
    }

    /// Request cancellation with the default `canceled` reason.
    pub fn cancel(&self) {
        self.inner.cancel.cancel();
    }

    /// Request cancellation with an explicit reason.
    ///
    /// The token latches on the first request and later requests are no-ops.
    /// Safe in every phase: before `run` the task observes the latched token
    /// as soon as it starts, and after completion latching has no observable
    /// effect on the outcome.
    pub fn cancel_with(&self, reason: Error) {
        self.inner.cancel.cancel_with(reason);
    }

    /// Read the cancellation latch.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// The token shared with the task body.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.inner.cancel.clone()
    }

    fn phase(&self) -> Phase {
        self.inner.lock_state().phase
    }
}

async fn drive<T>(inner: &Arc<JobInner<T>>, mut task: Box<dyn Task<Output = T>>)
where
    T: Clone + Default + Send + 'static,
{
    let outcome = {
        let run = AssertUnwindSafe(task.run(inner.cancel.clone())).catch_unwind();
        match run.await {
            Ok(outcome) => outcome,
            Err(panic) => Err(Error::task(panic_message(panic.as_ref()))),
        }
    };

    dispatch(inner, task.as_mut(), &outcome);
    tracing::debug!(job_id = %inner.id, ok = outcome.is_ok(), cancelled = inner.cancel.is_cancelled(), "job finished");

    let mut state = inner.lock_state();
    state.outcome = Some(outcome);
    state.phase = Phase::Done;
    drop(state);
    inner.done.notify_waiters();
}

/// Fire exactly one observer. A latched token dominates the run outcome.
fn dispatch<T>(inner: &JobInner<T>, task: &mut dyn Task<Output = T>, outcome: &Result<T>)
where
    T: Clone + Default + Send + 'static,
{
    let observed = std::panic::catch_unwind(AssertUnwindSafe(|| {
        if inner.cancel.is_cancelled() {
            let reason = inner.cancel.reason().unwrap_or(Error::Canceled);
            task.on_cancel(&reason);
        } else {
            match outcome {
                Ok(value) => task.on_success(value),
                Err(error) => task.on_error(error),
            }
        }
    }));

    // Swallow observer panics so the job still reaches its done phase.
    if observed.is_err() {
        tracing::warn!(job_id = %inner.id, "job observer panicked");
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::BoxFuture;

    struct Fixed(u32);

    impl Task for Fixed {
        type Output = u32;

        fn run(&mut self, _cancel: CancelToken) -> BoxFuture<'_, Result<u32>> {
            Box::pin(async move { Ok(self.0) })
        }
    }

    #[test]
    fn identifiers_are_unique_and_stable() {
        let first = Job::new(Fixed(1));
        let second = Job::new(Fixed(2));

        assert_ne!(first.id(), second.id());
        assert_eq!(first.id(), first.clone().id());
    }

    #[tokio::test]
    async fn queries_before_run_return_the_zero_state() {
        let job = Job::new(Fixed(9));

        job.wait().await;
        assert_eq!(job.result().await, Ok(0));
        assert!(!job.is_cancelled());
    }

    #[tokio::test]
    async fn outcome_is_re_readable() {
        let job = Job::new(Fixed(9));

        job.run();
        assert_eq!(job.result().await, Ok(9));
        assert_eq!(job.result().await, Ok(9));
    }
}
