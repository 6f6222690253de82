//! Fixed-delay retry for Drive metadata and listing calls.
//!
//! Every HTTP-layer failure is retried the same way, 4xx included, with a
//! constant delay and no jitter. Media downloads do not go through here.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{ProviderError, ProviderResult};

/// How many times and how often a remote call is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Constant pause between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Default number of attempts.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

    /// Default pause between attempts.
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

    /// Creates a policy.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// A policy that tries once and never sleeps.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS, Self::DEFAULT_DELAY)
    }
}

/// Runs a prepared remote call, retrying HTTP-layer failures.
///
/// `call` is invoked once per attempt and must build a fresh request each
/// time. Non-HTTP errors (bad JSON, protocol violations) are returned
/// immediately. When every attempt fails the result is a
/// [`RetriesExhausted`](crate::ProviderErrorCode::RetriesExhausted) error
/// whose source is the last failure.
pub async fn execute_with_retry<T, F, Fut>(policy: RetryPolicy, mut call: F) -> ProviderResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_http() => return Err(err),
            Err(err) if attempt >= policy.max_attempts => {
                return Err(ProviderError::retries_exhausted(format!(
                    "Drive backend would not respond after {} tries",
                    policy.max_attempts
                ))
                .with_source(err));
            }
            Err(err) => {
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %err,
                    "backend http error, trying again after {:?}",
                    policy.delay
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
        }
    }
}
