//! Task doubles covering the common workload shapes.

use crate::probe::{CallbackProbe, ProbeEvent};
use jobpool::{BoxFuture, CancelToken, Error, Result, Task};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Iterative Fibonacci with cooperative cancellation between steps.
///
/// Fails for `n == 0`. The sequence is built in a table and the token is
/// checked once per step; a cancelled run breaks early and returns whatever
/// ended up in slot `n` (zero unless the run got that far).
pub struct FibonacciTask {
    n: usize,
    probe: CallbackProbe,
}

impl FibonacciTask {
    /// Compute the `n`-th Fibonacci number, reporting to `probe`.
    pub fn new(n: usize, probe: CallbackProbe) -> Self {
        Self { n, probe }
    }
}

impl Task for FibonacciTask {
    type Output = u64;

    fn run(&mut self, cancel: CancelToken) -> BoxFuture<'_, Result<u64>> {
        Box::pin(async move {
            if self.n == 0 {
                return Err(Error::task("n is zero"));
            }

            let mut nums = vec![0u64; self.n + 1];
            nums[1] = 1;
            for i in 2..=self.n {
                if cancel.is_cancelled() {
                    break;
                }
                nums[i] = nums[i - 1] + nums[i - 2];
            }

            Ok(nums[self.n])
        })
    }

    fn on_success(&mut self, value: &u64) {
        self.probe.record(ProbeEvent::Success(value.to_string()));
    }

    fn on_error(&mut self, error: &Error) {
        self.probe.record(ProbeEvent::Error(error.clone()));
    }

    fn on_cancel(&mut self, reason: &Error) {
        self.probe.record(ProbeEvent::Cancel(reason.clone()));
    }
}

/// Holds until the test releases it, then succeeds with a fixed value.
///
/// Useful for keeping a worker deliberately busy. Release with
/// [`Notify::notify_one`]; the stored permit also covers a release sent
/// before the task started waiting.
pub struct GateTask {
    release: Arc<Notify>,
    value: u64,
    probe: CallbackProbe,
}

impl GateTask {
    /// Succeed with `value` once `release` is notified.
    pub fn new(release: Arc<Notify>, value: u64, probe: CallbackProbe) -> Self {
        Self {
            release,
            value,
            probe,
        }
    }
}

impl Task for GateTask {
    type Output = u64;

    fn run(&mut self, _cancel: CancelToken) -> BoxFuture<'_, Result<u64>> {
        Box::pin(async move {
            self.release.notified().await;
            Ok(self.value)
        })
    }

    fn on_success(&mut self, value: &u64) {
        self.probe.record(ProbeEvent::Success(value.to_string()));
    }

    fn on_error(&mut self, error: &Error) {
        self.probe.record(ProbeEvent::Error(error.clone()));
    }

    fn on_cancel(&mut self, reason: &Error) {
        self.probe.record(ProbeEvent::Cancel(reason.clone()));
    }
}

/// Long-polling worker: loops until its token latches, sleeping between
/// polls, and reports whether it observed the cancellation.
pub struct PollingTask {
    interval: Duration,
    probe: CallbackProbe,
}

impl PollingTask {
    /// Poll the token every `interval`.
    pub fn new(interval: Duration, probe: CallbackProbe) -> Self {
        Self { interval, probe }
    }
}

impl Task for PollingTask {
    type Output = bool;

    fn run(&mut self, cancel: CancelToken) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            while !cancel.is_cancelled() {
                tokio::time::sleep(self.interval).await;
            }
            Ok(true)
        })
    }

    fn on_success(&mut self, value: &bool) {
        self.probe.record(ProbeEvent::Success(value.to_string()));
    }

    fn on_error(&mut self, error: &Error) {
        self.probe.record(ProbeEvent::Error(error.clone()));
    }

    fn on_cancel(&mut self, reason: &Error) {
        self.probe.record(ProbeEvent::Cancel(reason.clone()));
    }
}

/// Panics mid-run with a fixed message.
pub struct PanickingTask {
    message: &'static str,
    probe: CallbackProbe,
}

impl PanickingTask {
    /// Panic with `message` as soon as the task runs.
    pub fn new(message: &'static str, probe: CallbackProbe) -> Self {
        Self { message, probe }
    }
}

impl Task for PanickingTask {
    type Output = u64;

    fn run(&mut self, _cancel: CancelToken) -> BoxFuture<'_, Result<u64>> {
        Box::pin(async move { panic!("{}", self.message) })
    }

    fn on_error(&mut self, error: &Error) {
        self.probe.record(ProbeEvent::Error(error.clone()));
    }
}

/// Succeeds, records the success event, then panics inside the observer.
pub struct PanickingObserverTask {
    probe: CallbackProbe,
}

impl PanickingObserverTask {
    /// Report to `probe` before the observer panics.
    pub fn new(probe: CallbackProbe) -> Self {
        Self { probe }
    }
}

impl Task for PanickingObserverTask {
    type Output = u64;

    fn run(&mut self, _cancel: CancelToken) -> BoxFuture<'_, Result<u64>> {
        Box::pin(async { Ok(1) })
    }

    fn on_success(&mut self, value: &u64) {
        self.probe.record(ProbeEvent::Success(value.to_string()));
        panic!("observer exploded");
    }
}
