//! # jobpool-testkit
//!
//! Deterministic tasks, executors, and observer probes for exercising the
//! jobpool toolkit in tests.

pub mod executors;
pub mod probe;
pub mod tasks;

pub use executors::DivideExecutor;
pub use probe::{CallbackProbe, ProbeEvent};
pub use tasks::{FibonacciTask, GateTask, PanickingObserverTask, PanickingTask, PollingTask};

use std::time::Duration;

/// Poll `condition` every few milliseconds until it holds.
///
/// Panics when the condition is still false after one second; timing-based
/// tests use this instead of fixed sleeps.
pub async fn eventually(condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within one second");
}
