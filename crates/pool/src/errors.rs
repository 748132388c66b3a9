//! Error values shared by jobs, the runner, and cancellation.

use serde::{Deserialize, Serialize};

/// Toolkit result type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures reported by the toolkit and reasons carried by cancellations.
///
/// Cancel reasons are ordinary error values so they can be stored in a
/// [`CancelToken`](crate::CancelToken), compared in tests, and handed to the
/// `on_cancel` observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum Error {
    /// Submitting to a runner that is not running.
    #[error("runner is stopped")]
    Stopped,

    /// Default cancellation reason.
    #[error("canceled")]
    Canceled,

    /// Cancellation requested through [`Runner::cancel`](crate::Runner::cancel).
    #[error("canceled by runner")]
    CanceledByRunner,

    /// Cancellation applied to jobs still running when the runner stopped.
    #[error("runner was stopped")]
    RunnerStopped,

    /// Cancellation scheduled by [`cancel_after`](crate::cancel_after).
    #[error("timeout")]
    Timeout,

    /// A failure reported by user task code, including caught panics.
    #[error("{0}")]
    Task(String),
}

impl Error {
    /// Wrap a user task failure message.
    pub fn task(message: impl Into<String>) -> Self {
        Self::Task(message.into())
    }

    /// True for the cancel reasons (user cancel, runner cancel, stop, timeout).
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(
            self,
            Self::Canceled | Self::CanceledByRunner | Self::RunnerStopped | Self::Timeout
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_strings_are_stable() {
        assert_eq!(Error::Stopped.to_string(), "runner is stopped");
        assert_eq!(Error::Canceled.to_string(), "canceled");
        assert_eq!(Error::CanceledByRunner.to_string(), "canceled by runner");
        assert_eq!(Error::RunnerStopped.to_string(), "runner was stopped");
        assert_eq!(Error::Timeout.to_string(), "timeout");
        assert_eq!(Error::task("n is zero").to_string(), "n is zero");
    }

    #[test]
    fn cancellation_classifier() {
        assert!(Error::Canceled.is_cancellation());
        assert!(Error::CanceledByRunner.is_cancellation());
        assert!(Error::RunnerStopped.is_cancellation());
        assert!(Error::Timeout.is_cancellation());

        assert!(!Error::Stopped.is_cancellation());
        assert!(!Error::task("boom").is_cancellation());
    }
}
