//! Deadline-based cancellation for job handles.

use crate::errors::Error;
use crate::job::Job;
use std::time::Duration;

/// Latch the job's cancellation token with [`Error::Timeout`] once `after`
/// elapses, measured from this call.
///
/// Fire-and-forget: the timer keeps its own handle to the job, and a timer
/// firing after the job finished latches the token without observable effect
/// on the outcome. The timeout is advisory like any other cancellation; the
/// task still decides when to notice it. Must be called from within a tokio
/// runtime.
pub fn cancel_after<T>(job: &Job<T>, after: Duration)
where
    T: Clone + Default + Send + 'static,
{
    let job = job.clone();
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        job.cancel_with(Error::Timeout);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::errors::Result;
    use crate::task::{BoxFuture, Task};

    struct WaitForCancel;

    impl Task for WaitForCancel {
        type Output = bool;

        fn run(&mut self, cancel: CancelToken) -> BoxFuture<'_, Result<bool>> {
            Box::pin(async move {
                cancel.cancelled().await;
                Ok(true)
            })
        }
    }

    #[tokio::test]
    async fn latches_the_timeout_reason() {
        let job = Job::new(WaitForCancel);

        job.run();
        cancel_after(&job, Duration::from_millis(10));
        job.wait().await;

        assert!(job.is_cancelled());
        assert_eq!(job.cancel_token().reason(), Some(Error::Timeout));
        assert_eq!(job.result().await, Ok(true));
    }

    #[tokio::test]
    async fn firing_after_completion_is_harmless() {
        struct Immediate;

        impl Task for Immediate {
            type Output = u32;

            fn run(&mut self, _cancel: CancelToken) -> BoxFuture<'_, Result<u32>> {
                Box::pin(async { Ok(5) })
            }
        }

        let job = Job::new(Immediate);
        job.run();
        job.wait().await;

        cancel_after(&job, Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(job.result().await, Ok(5));
    }
}
