//! # jobpool
//!
//! An embeddable toolkit for running user-supplied units of work on a fixed
//! pool of workers, with observable lifecycle events and first-class
//! cooperative cancellation.
//!
//! Three abstractions cooperate:
//!
//! - [`Task`]: the user computation plus optional lifecycle observers.
//! - [`Job`]: a one-shot handle that starts one task, exposes its result, and
//!   fires exactly one lifecycle observer.
//! - [`Runner`]: a bounded queue drained by a fixed number of workers, with
//!   per-job cancellation by identifier and orderly start/stop.
//!
//! Around those, [`cancel_after`] schedules a deadline cancellation for a job
//! and [`Promise`] fans out independent [`Executor`] units with first-error
//! short-circuiting.
//!
//! Cancellation is cooperative throughout: a task decides when to notice the
//! latched [`CancelToken`] by polling it (or awaiting it); the runtime never
//! preempts a task.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod cancel;
pub mod errors;
pub mod job;
pub mod promise;
pub mod queue;
pub mod runner;
pub mod task;
pub mod timeout;

pub use cancel::CancelToken;
pub use errors::{Error, Result};
pub use job::Job;
pub use promise::{Executor, Promise};
pub use queue::BoundedQueue;
pub use runner::{Runner, RunnerConfig, RunnerStatus};
pub use task::{BoxFuture, Task};
pub use timeout::cancel_after;
