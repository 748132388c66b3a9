//! Fan-out execution of independent work units.

use crate::errors::{Error, Result};
use crate::task::BoxFuture;
use std::sync::{Arc, Mutex, PoisonError};

/// A unit of work with no typed result, executed inside a [`Promise`].
pub trait Executor: Send + 'static {
    /// Perform the work.
    fn execute(&mut self) -> BoxFuture<'_, Result<()>>;
}

type SuccessFn = Arc<dyn Fn() + Send + Sync>;
type ErrorFn = Arc<dyn Fn(&Error) + Send + Sync>;

/// Concurrent execution of independent [`Executor`] units with first-error
/// short-circuiting.
///
/// All units run concurrently. The first error is recorded and reported
/// exactly once; units that have not started by then are skipped, while
/// already-running units finish with their outcomes ignored. The success
/// callback fires once per unit that finishes without error.
pub struct Promise {
    executors: Vec<Box<dyn Executor>>,
    on_success: Option<SuccessFn>,
    on_error: Option<ErrorFn>,
}

impl Promise {
    /// Create a promise over the given executors.
    #[must_use]
    pub fn new(executors: Vec<Box<dyn Executor>>) -> Self {
        Self {
            executors,
            on_success: None,
            on_error: None,
        }
    }

    /// Invoke `callback` after every executor that finishes without error.
    #[must_use]
    pub fn then(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(callback));
        self
    }

    /// Invoke `callback` once, with the first error.
    #[must_use]
    pub fn on_error(mut self, callback: impl Fn(&Error) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    /// Start every executor without blocking the caller.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self) {
        tokio::spawn(async move {
            self.settle().await;
        });
    }

    /// Drive every executor and return the first error, if any.
    pub async fn join(self) -> Result<()> {
        match self.settle().await {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn settle(self) -> Option<Error> {
        let outcome = Arc::new(FirstError {
            error: Mutex::new(None),
            on_error: self.on_error,
        });
        let on_success = self.on_success;

        let mut handles = Vec::with_capacity(self.executors.len());
        for mut executor in self.executors {
            let outcome = Arc::clone(&outcome);
            let on_success = on_success.clone();
            handles.push(tokio::spawn(async move {
                // Units that have not started once an error is recorded are skipped.
                if outcome.get().is_some() {
                    return;
                }

                match executor.execute().await {
                    Ok(()) => {
                        if let Some(callback) = on_success {
                            callback();
                        }
                    },
                    Err(error) => outcome.record(error),
                }
            }));
        }

        for handle in handles {
            if let Err(join_error) = handle.await {
                tracing::warn!(%join_error, "promise executor crashed");
                outcome.record(Error::task(join_error.to_string()));
            }
        }

        outcome.get()
    }
}

struct FirstError {
    error: Mutex<Option<Error>>,
    on_error: Option<ErrorFn>,
}

impl FirstError {
    /// Keep the first recorded error and fire the error callback for it.
    fn record(&self, error: Error) {
        let mut guard = self.error.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_some() {
            return;
        }
        *guard = Some(error.clone());
        drop(guard);

        if let Some(callback) = &self.on_error {
            callback(&error);
        }
    }

    fn get(&self) -> Option<Error> {
        self.error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
