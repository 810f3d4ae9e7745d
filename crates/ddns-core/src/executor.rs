//! Bounded network executor
//!
//! Every network call made by the engine goes through [`BoundedExecutor`],
//! which guarantees the caller gets control back within the operation's
//! deadline.
//!
//! ## Ownership model
//!
//! ```text
//!  supervisor (caller)                 worker task
//!  ───────────────────                 ───────────
//!  spawn ─────────────────────────────► owns: future, OperationGuard,
//!                                             oneshot::Sender (result box)
//!  select { result box, deadline }
//!     │ result first  → take result, join worker
//!     │ deadline first → cancel token, drop receiver, return Timeout
//!                                      worker sees the token at its next
//!                                      await point, drops its future and
//!                                      the guard (gauge -1)
//! ```
//!
//! The guard lives in the worker, so the active-operation gauge is released
//! exactly once on either path. After abandonment the supervisor holds nothing
//! the worker still uses: a late result is sent into a closed channel and
//! dropped by the worker itself.

use crate::error::{Error, Result};
use crate::stats::RuntimeStats;
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Runs network operations under a deadline
#[derive(Debug, Clone)]
pub struct BoundedExecutor {
    stats: Arc<RuntimeStats>,
    /// Parent of every per-operation token; cancelled on shutdown
    root: CancellationToken,
}

impl BoundedExecutor {
    /// Create an executor reporting into `stats`
    pub fn new(stats: Arc<RuntimeStats>) -> Self {
        Self {
            stats,
            root: CancellationToken::new(),
        }
    }

    /// Signal every in-flight operation to stop
    pub fn cancel_all(&self) {
        self.root.cancel();
    }

    /// Run `work` as its own task and wait at most `deadline` for its outcome
    ///
    /// # Returns
    ///
    /// - `Ok(T)` / `Err(e)`: the operation finished in time
    /// - `Err(Error::Timeout)`: the deadline elapsed first; the operation was
    ///   abandoned and asked to stop
    pub async fn execute<T, F>(&self, operation: &str, deadline: Duration, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let guard = self.stats.operation_started();
        let token = self.root.child_token();
        let (result_tx, mut result_rx) = oneshot::channel();

        let worker_token = token.clone();
        let name = operation.to_string();
        let worker = tokio::spawn(async move {
            let _guard = guard;
            let outcome = tokio::select! {
                biased;
                _ = worker_token.cancelled() => {
                    debug!(operation = %name, "Operation cancelled after abandonment");
                    return;
                }
                outcome = work => outcome,
            };
            if result_tx.send(outcome).is_err() {
                debug!(operation = %name, "Abandoned operation finished; result discarded");
            }
        });

        tokio::select! {
            received = &mut result_rx => {
                // Worker is past its send or gone; joining only retires the task
                let joined = worker.await;
                match (received, joined) {
                    (Ok(outcome), _) => outcome,
                    (Err(_), Err(e)) if e.is_panic() => {
                        let message = panic_message(e.into_panic());
                        error!(operation = %operation, "Operation panicked: {}", message);
                        Err(Error::panicked(operation, message))
                    }
                    (Err(_), _) => Err(Error::transport(format!(
                        "{} ended without reporting a result",
                        operation
                    ))),
                }
            }
            _ = tokio::time::sleep(deadline) => {
                token.cancel();
                warn!(
                    operation = %operation,
                    deadline_ms = u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
                    "Operation exceeded its deadline; abandoning"
                );
                Err(Error::timeout(operation, deadline))
            }
        }
    }
}

/// Text of a panic payload; non-string payloads are not described
fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
