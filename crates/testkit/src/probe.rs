//! Shared recording of lifecycle observer invocations.

use jobpool::Error;
use std::sync::{Arc, Mutex};

/// A lifecycle event recorded by a probe-instrumented task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeEvent {
    /// `on_success` fired with the rendered value.
    Success(String),
    /// `on_error` fired with this error.
    Error(Error),
    /// `on_cancel` fired with this reason.
    Cancel(Error),
}

/// Thread-safe log of observer invocations, shared between a task and the
/// test asserting on it.
#[derive(Debug, Clone, Default)]
pub struct CallbackProbe {
    events: Arc<Mutex<Vec<ProbeEvent>>>,
}

impl CallbackProbe {
    /// Create an empty probe.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    pub fn record(&self, event: ProbeEvent) {
        self.events.lock().expect("probe lock").push(event);
    }

    /// Snapshot of the recorded events, in invocation order.
    pub fn events(&self) -> Vec<ProbeEvent> {
        self.events.lock().expect("probe lock").clone()
    }

    /// Total number of observer invocations so far.
    pub fn count(&self) -> usize {
        self.events.lock().expect("probe lock").len()
    }
}
