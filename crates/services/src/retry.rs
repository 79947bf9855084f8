//! # Retry Executor
//!
//! Wraps a single remote operation with a bounded number of attempts and a
//! linear backoff (`base_delay × attempt`) between them.
//!
//! Failure handling depends on the [`OperationKind`]:
//!
//! | kind       | backend not remote            | retries exhausted                         |
//! |------------|-------------------------------|-------------------------------------------|
//! | `Query`    | empty result, no attempt made | empty result, logged                      |
//! | `Mutation` | `BackendUnavailable`          | `RetriesExhausted`, mode demoted to local |
//!
//! The operation is re-invoked verbatim on each attempt. Callers that write
//! must make that safe, e.g. with an idempotency key.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use domains::{AppError, Result};
use tracing::{debug, warn};

use crate::mode::ModeState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Delay slept after failed attempt number `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

#[derive(Clone, Debug)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    mode: Arc<ModeState>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy, mode: Arc<ModeState>) -> Self {
        Self { policy, mode }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn mode(&self) -> &Arc<ModeState> {
        &self.mode
    }

    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        operation: &str,
        kind: OperationKind,
        mut op: F,
    ) -> Result<T>
    where
        T: Default,
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        if !self.mode.is_remote() {
            return match kind {
                OperationKind::Query => {
                    debug!(operation, "remote backend not available, returning empty result");
                    Ok(T::default())
                }
                OperationKind::Mutation => Err(AppError::BackendUnavailable {
                    operation: operation.to_string(),
                }),
            };
        }

        let attempts = self.policy.max_attempts.max(1);
        for attempt in 1..=attempts {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "remote operation recovered");
                    }
                    return Ok(value);
                }
                Err(err) if attempt < attempts => {
                    let delay = self.policy.delay_for_attempt(attempt);
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "remote operation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    warn!(operation, attempt, error = %err, "remote operation failed on final attempt");
                }
            }
        }

        match kind {
            OperationKind::Query => {
                warn!(operation, attempts, "query retries exhausted, degrading to empty result");
                Ok(T::default())
            }
            OperationKind::Mutation => {
                let err = AppError::RetriesExhausted {
                    operation: operation.to_string(),
                    attempts,
                };
                self.mode.demote(&err.to_string());
                Err(err)
            }
        }
    }

    /// Query shorthand: never fails, yields `T::default()` on any failure.
    pub async fn query<T, F, Fut>(&self, operation: &str, op: F) -> T
    where
        T: Default,
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.execute_with_retry(operation, OperationKind::Query, op)
            .await
            .unwrap_or_default()
    }

    pub async fn mutate<T, F, Fut>(&self, operation: &str, op: F) -> Result<T>
    where
        T: Default,
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.execute_with_retry(operation, OperationKind::Mutation, op).await
    }
}
