//! The bounded worker-pool runner.

use crate::cancel::CancelToken;
use crate::errors::{Error, Result};
use crate::job::Job;
use crate::queue::BoundedQueue;
use crate::task::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use uuid::Uuid;

const DEFAULT_QUEUE_SIZE: usize = 1024;

/// Runner construction options. Zero values select the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunnerConfig {
    /// Number of workers. `0` selects `max(1, available CPUs - 1)`.
    pub concurrency: usize,
    /// Queued submissions accepted before `submit` blocks. `0` selects 1024.
    pub queue_size: usize,
}

impl RunnerConfig {
    fn effective_concurrency(self) -> usize {
        if self.concurrency != 0 {
            return self.concurrency;
        }
        let cpus = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        cpus.saturating_sub(1).max(1)
    }

    fn effective_queue_size(self) -> usize {
        if self.queue_size == 0 {
            DEFAULT_QUEUE_SIZE
        } else {
            self.queue_size
        }
    }
}

/// Point-in-time runner counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerStatus {
    /// Current worker target.
    pub concurrency: usize,
    /// Jobs a worker has dequeued and not yet finished.
    pub running_tasks: usize,
}

/// Erased view of a job the runner can drive.
///
/// Workers hold jobs of mixed output types, so the queue stores them behind
/// this object-safe surface.
trait RunnableJob: Send {
    fn job_id(&self) -> Uuid;
    fn token(&self) -> CancelToken;
    fn start(&self);
    fn completed(&self) -> BoxFuture<'_, ()>;
}

impl<T> RunnableJob for Job<T>
where
    T: Clone + Default + Send + 'static,
{
    fn job_id(&self) -> Uuid {
        self.id()
    }

    fn token(&self) -> CancelToken {
        self.cancel_token()
    }

    fn start(&self) {
        self.run();
    }

    fn completed(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.wait())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunnerPhase {
    Stopped,
    Running,
}

struct RunnerState {
    phase: RunnerPhase,
    /// Worker target; live workers converge on it across start/scale calls.
    concurrency: usize,
    /// Live workers, including those still finishing a job after a stop.
    workers: usize,
    /// Outstanding scale-down requests; each retires one worker.
    retiring: usize,
    /// Dequeued-but-unfinished jobs, keyed by the full job identifier.
    /// Only the driving worker inserts and removes an entry, so every entry
    /// belongs to a job that is genuinely being driven right now.
    running: HashMap<Uuid, CancelToken>,
    /// Identifiers scheduled for cancellation before dispatch.
    to_cancel: HashSet<Uuid>,
}

struct RunnerInner {
    queue: BoundedQueue<Box<dyn RunnableJob>>,
    state: Mutex<RunnerState>,
    /// Woken when stop or scale-down changes the exit conditions.
    exit_gate: Notify,
    /// Woken by the last worker leaving a stopped runner.
    quiesced: Notify,
}

impl RunnerInner {
    fn lock_state(&self) -> MutexGuard<'_, RunnerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolves once the runner stops or a scale-down request is pending.
    async fn exit_requested(&self) {
        loop {
            let notified = self.exit_gate.notified();
            if self.exit_pending() {
                return;
            }
            notified.await;
        }
    }

    fn exit_pending(&self) -> bool {
        let state = self.lock_state();
        state.phase == RunnerPhase::Stopped || state.retiring > 0
    }

    /// Re-check the exit conditions authoritatively and leave the pool.
    ///
    /// Returns false when the runner was restarted before this worker left,
    /// in which case it keeps serving as part of the new generation.
    fn confirm_exit(&self) -> bool {
        let mut state = self.lock_state();
        if state.retiring > 0 {
            state.retiring -= 1;
        } else if state.phase != RunnerPhase::Stopped {
            return false;
        }

        state.workers = state.workers.saturating_sub(1);
        let quiesced = state.phase == RunnerPhase::Stopped && state.workers == 0;
        drop(state);

        if quiesced {
            self.quiesced.notify_waiters();
        }
        tracing::debug!("worker exited");
        true
    }
}

/// A fixed pool of workers draining a bounded queue of [`Job`] handles.
///
/// The runner tracks every dequeued job by identifier so
/// [`cancel`](Self::cancel) can reach work that is already running, and
/// defers cancellation of still-queued jobs until they are dispatched.
/// Created stopped; [`start`](Self::start) spawns the workers.
pub struct Runner {
    inner: Arc<RunnerInner>,
}

impl Clone for Runner {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for Runner {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock_state();
        formatter
            .debug_struct("Runner")
            .field("phase", &state.phase)
            .field("concurrency", &state.concurrency)
            .field("running_tasks", &state.running.len())
            .finish_non_exhaustive()
    }
}

impl Runner {
    /// Create a stopped runner with normalized configuration.
    #[must_use]
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            inner: Arc::new(RunnerInner {
                queue: BoundedQueue::new(config.effective_queue_size()),
                state: Mutex::new(RunnerState {
                    phase: RunnerPhase::Stopped,
                    concurrency: config.effective_concurrency(),
                    workers: 0,
                    retiring: 0,
                    running: HashMap::new(),
                    to_cancel: HashSet::new(),
                }),
                exit_gate: Notify::new(),
                quiesced: Notify::new(),
            }),
        }
    }

    /// Spawn the workers and accept submissions. Idempotent.
    ///
    /// Starting again after a stop reuses whatever is still queued, resets
    /// the exit bookkeeping, and tops the pool back up to the worker target.
    /// Workers that had not yet noticed the stop simply keep serving, and the
    /// jobs they are still driving stay in the running set so
    /// [`cancel`](Self::cancel) keeps reaching them. Must be called from
    /// within a tokio runtime.
    pub fn start(&self) {
        let mut state = self.inner.lock_state();
        if state.phase == RunnerPhase::Running {
            return;
        }
        state.phase = RunnerPhase::Running;
        state.retiring = 0;

        let missing = state.concurrency.saturating_sub(state.workers);
        for _ in 0..missing {
            spawn_worker(&self.inner);
        }
        state.workers += missing;
        tracing::debug!(workers = state.workers, "runner started");
    }

    /// Stop the runner. Idempotent.
    ///
    /// Every running job is cancelled with the `runner was stopped` reason
    /// and each worker exits once its current job finishes. The queue is not
    /// drained: queued jobs are abandoned until a later [`start`](Self::start)
    /// picks them back up, and a submitter blocked on a full queue stays
    /// blocked.
    pub fn stop(&self) {
        let mut state = self.inner.lock_state();
        if state.phase == RunnerPhase::Stopped {
            return;
        }
        state.phase = RunnerPhase::Stopped;
        for token in state.running.values() {
            token.cancel_with(Error::RunnerStopped);
        }
        drop(state);

        self.inner.exit_gate.notify_waiters();
        tracing::debug!("runner stopping");
    }

    /// Hand a job to the runner.
    ///
    /// Fails with [`Error::Stopped`] when the runner is stopped. Otherwise
    /// the job is enqueued, waiting while the queue is full (bounded
    /// backpressure). Jobs from a single submitter are dispatched in
    /// submission order; ordering across submitters is arrival order.
    pub async fn submit<T>(&self, job: &Job<T>) -> Result<()>
    where
        T: Clone + Default + Send + 'static,
    {
        if self.inner.lock_state().phase == RunnerPhase::Stopped {
            return Err(Error::Stopped);
        }

        self.inner.queue.enqueue(Box::new(job.clone())).await;
        Ok(())
    }

    /// Ask the job with this identifier to stop.
    ///
    /// A running job is cancelled immediately with the `canceled by runner`
    /// reason. A job not currently running is scheduled instead and cancelled
    /// by the worker that dequeues it, under the same lock used here, so
    /// exactly one of the two paths applies. Identifiers this runner never
    /// sees stay recorded, which is cheap and harmless.
    pub fn cancel(&self, id: Uuid) {
        let mut state = self.inner.lock_state();
        if let Some(token) = state.running.get(&id) {
            token.cancel_with(Error::CanceledByRunner);
        } else {
            state.to_cancel.insert(id);
        }
    }

    /// Block until the runner is stopped and every worker has exited.
    ///
    /// Workers remove a job from the running set before they leave, so this
    /// also means no job is still being driven. Returns immediately on a
    /// runner that was never started.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.quiesced.notified();
            {
                let state = self.inner.lock_state();
                if state.phase == RunnerPhase::Stopped && state.workers == 0 {
                    return;
                }
            }
            notified.await;
        }
    }

    /// Raise the worker target by `n`, spawning workers when running.
    pub fn scale_up(&self, n: usize) {
        let mut state = self.inner.lock_state();
        state.concurrency = state.concurrency.saturating_add(n);
        if state.phase == RunnerPhase::Running {
            for _ in 0..n {
                spawn_worker(&self.inner);
            }
            state.workers += n;
        }
    }

    /// Lower the worker target by `n`, saturating at zero.
    ///
    /// On a running pool up to `n` workers retire, each after finishing its
    /// current job. On a stopped runner only the target is adjusted.
    pub fn scale_down(&self, n: usize) {
        let mut state = self.inner.lock_state();
        state.concurrency = state.concurrency.saturating_sub(n);
        if state.phase != RunnerPhase::Running {
            return;
        }

        let retiring = n.min(state.workers.saturating_sub(state.retiring));
        if retiring == 0 {
            return;
        }
        state.retiring += retiring;
        drop(state);
        self.inner.exit_gate.notify_waiters();
    }

    /// Snapshot of the worker target and in-flight job count.
    #[must_use]
    pub fn status(&self) -> RunnerStatus {
        let state = self.inner.lock_state();
        RunnerStatus {
            concurrency: state.concurrency,
            running_tasks: state.running.len(),
        }
    }
}

fn spawn_worker(inner: &Arc<RunnerInner>) {
    let inner = Arc::clone(inner);
    tokio::spawn(async move {
        worker_loop(inner).await;
    });
}

async fn worker_loop(inner: Arc<RunnerInner>) {
    loop {
        tokio::select! {
            job = inner.queue.dequeue() => {
                let id = job.job_id();
                let token = job.token();
                {
                    let mut state = inner.lock_state();
                    state.running.insert(id, token.clone());
                    // Apply a cancellation scheduled while the job was queued.
                    if state.to_cancel.remove(&id) {
                        token.cancel_with(Error::CanceledByRunner);
                    }
                }

                job.start();
                job.completed().await;

                inner.lock_state().running.remove(&id);
            }
            () = inner.exit_requested() => {
                if inner.confirm_exit() {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_zero_values_select_defaults() {
        let config = RunnerConfig::default();

        assert!(config.effective_concurrency() >= 1);
        assert_eq!(config.effective_queue_size(), DEFAULT_QUEUE_SIZE);
    }

    #[test]
    fn config_explicit_values_are_kept() {
        let config = RunnerConfig {
            concurrency: 3,
            queue_size: 7,
        };

        assert_eq!(config.effective_concurrency(), 3);
        assert_eq!(config.effective_queue_size(), 7);
    }

    #[test]
    fn new_runner_is_stopped_and_idle() {
        let runner = Runner::new(RunnerConfig {
            concurrency: 3,
            queue_size: 1,
        });

        let status = runner.status();
        assert_eq!(status.concurrency, 3);
        assert_eq!(status.running_tasks, 0);
    }

    #[tokio::test]
    async fn submit_to_a_never_started_runner_fails() {
        struct Noop;

        impl crate::Task for Noop {
            type Output = u32;

            fn run(&mut self, _cancel: CancelToken) -> BoxFuture<'_, Result<u32>> {
                Box::pin(async { Ok(0) })
            }
        }

        let runner = Runner::new(RunnerConfig::default());
        let job = Job::new(Noop);

        assert_eq!(runner.submit(&job).await, Err(Error::Stopped));
    }
}
