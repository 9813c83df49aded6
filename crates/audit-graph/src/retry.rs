//! Bounded retry for single store operations, graph or relational.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::SyncError;

const MAX_DELAY: Duration = Duration::from_secs(30);

/// Attempts, backoff and per-attempt timeout for one store operation.
///
/// Retries wrap exactly one operation, never a whole batch, so a success
/// already applied is never replayed by a failure elsewhere.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub op_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            op_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// No retries; a single attempt bounded by the timeout.
    pub fn once(op_timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            op_timeout,
        }
    }

    /// Delay before attempt `attempt + 1` (attempts are 1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(MAX_DELAY)
    }

    /// Run `op` until it succeeds or the attempts are exhausted.
    ///
    /// Timeouts count as failed attempts. The last error is returned as
    /// [`SyncError::Transient`].
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match tokio::time::timeout(self.op_timeout, op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => e,
                Err(_) => anyhow::anyhow!("timed out after {:?}", self.op_timeout),
            };

            if attempt >= attempts {
                return Err(SyncError::Transient {
                    operation: operation.to_string(),
                    source: err,
                });
            }

            let delay = self.delay_after(attempt);
            warn!(
                operation,
                attempt,
                max_attempts = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Store operation failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Run a synchronous relational read or write under the same policy.
    pub async fn run_db<T, E, F>(&self, operation: &str, mut op: F) -> Result<T, SyncError>
    where
        F: FnMut() -> Result<T, E>,
        E: Into<anyhow::Error>,
    {
        self.run(operation, || std::future::ready(op().map_err(Into::into)))
            .await
    }
}
