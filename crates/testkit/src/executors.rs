//! Executor doubles for promise tests.

use jobpool::{BoxFuture, Error, Executor, Result};

/// Integer division; fails on a zero divisor.
pub struct DivideExecutor {
    a: i64,
    b: i64,
}

impl DivideExecutor {
    /// Divide `a` by `b` when executed.
    pub fn new(a: i64, b: i64) -> Self {
        Self { a, b }
    }
}

impl Executor for DivideExecutor {
    fn execute(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.b == 0 {
                return Err(Error::task("division by zero"));
            }
            let _ = self.a / self.b;
            Ok(())
        })
    }
}
