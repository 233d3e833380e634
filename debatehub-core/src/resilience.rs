//! Bounded retries for calls into external collaborators
//!
//! Every attempt runs under a timeout; transient failures are retried with
//! exponential backoff from the `backon` crate. Anything that is not
//! transient is returned immediately.

use backon::{BackoffBuilder, ExponentialBuilder};
use std::future::Future;
use std::time::Duration;

use crate::{Error, Result};

/// Retry policy for one class of collaborator calls
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Timeout applied to each attempt
    pub attempt_timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(3),
            max_retries: 2,
            min_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(attempt_timeout: Duration, max_retries: usize) -> Self {
        Self {
            attempt_timeout,
            max_retries,
            ..Self::default()
        }
    }

    fn backoff(&self) -> impl Iterator<Item = Duration> {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
            .with_jitter()
            .build()
    }
}

/// Run `op` until it succeeds, fails permanently, or the policy is exhausted
pub async fn with_retry<T, F, Fut>(name: &str, policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err = None;
    for delay in std::iter::once(Duration::ZERO).chain(policy.backoff()) {
        if delay > Duration::ZERO {
            tokio::time::sleep(delay).await;
        }

        let err = match tokio::time::timeout(policy.attempt_timeout, op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) if !e.is_transient() => return Err(e),
            Ok(Err(e)) => e,
            Err(_) => Error::StorageUnavailable(format!(
                "{name} timed out after {:?}",
                policy.attempt_timeout
            )),
        };

        tracing::warn!(operation = name, error = %err, "Collaborator call failed, retrying");
        last_err = Some(err);
    }

    Err(last_err.unwrap_or_else(|| Error::StorageUnavailable(format!("{name}: retry exhausted"))))
}
