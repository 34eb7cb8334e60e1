use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, warn};

use crate::core::error::{AppError, Result};

/// Default number of attempts for a unit of work that lost a lock race
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Retry policy for units of work that fail with row lock contention.
///
/// Only `AppError::ReconciliationConflict` is retried. Every other error,
/// including gateway failures, is returned from the first attempt unchanged.
#[derive(Debug, Clone, Copy)]
pub struct ConflictRetry {
    max_attempts: u32,
    base_delay: Duration,
}

impl ConflictRetry {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(50),
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `op` until it succeeds, fails with a non-conflict error, or attempts run out.
    ///
    /// Backoff doubles after each conflict: 50ms, 100ms, 200ms with the default delay.
    pub async fn run<T, F, Fut>(&self, operation: &str, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Err(AppError::ReconciliationConflict(msg)) if attempt < self.max_attempts => {
                    let delay = self.base_delay * 2u32.pow(attempt - 1);
                    warn!(
                        operation = operation,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %msg,
                        "Unit of work hit a lock conflict, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(AppError::ReconciliationConflict(msg)) => {
                    error!(
                        operation = operation,
                        attempts = attempt,
                        error = %msg,
                        "Lock conflict persisted after all attempts"
                    );
                    return Err(AppError::ReconciliationConflict(msg));
                }
                other => return other,
            }
        }
    }
}

impl Default for ConflictRetry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}
