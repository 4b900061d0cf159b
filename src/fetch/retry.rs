// Bounded retries with exponential backoff around a single-item fetch
//
// Every attempt goes through the shared limiter, retries included.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use metrics::counter;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::{BatchError, ErrorKind, FetchResult, ItemFetcher, SlidingWindowLimiter};
use crate::marketplace::Marketplace;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per identifier, first try included.
    pub max_retries: u32,
    /// Delay before retry `n` (0-based) is `delay_base ^ n` seconds.
    pub delay_base: f64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay_base: f64) -> Result<Self, BatchError> {
        if max_retries == 0 {
            return Err(BatchError::invalid_setting(
                "max_retries must be greater than 0",
            ));
        }
        if !delay_base.is_finite() || delay_base <= 0.0 {
            return Err(BatchError::invalid_setting(
                "retry delay_base must be a positive number",
            ));
        }
        Ok(Self {
            max_retries,
            delay_base,
        })
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        let secs = self.delay_base.powi(attempt as i32);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Sum of every backoff the policy can schedule for one identifier.
    pub fn total_backoff(&self) -> Duration {
        (0..self.max_retries.saturating_sub(1))
            .map(|attempt| self.backoff(attempt))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay_base: 2.0,
        }
    }
}

pub struct RetryingFetcher<F: ?Sized> {
    fetcher: Arc<F>,
    limiter: Arc<SlidingWindowLimiter>,
    policy: RetryPolicy,
}

impl<F: ItemFetcher + ?Sized> RetryingFetcher<F> {
    pub fn new(fetcher: Arc<F>, limiter: Arc<SlidingWindowLimiter>, policy: RetryPolicy) -> Self {
        Self {
            fetcher,
            limiter,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn limiter(&self) -> &Arc<SlidingWindowLimiter> {
        &self.limiter
    }

    /// Produce exactly one result for `identifier`. Never panics on behalf of the
    /// underlying fetcher: panics are caught and treated as failed attempts.
    pub async fn fetch(
        &self,
        identifier: &str,
        marketplace: Marketplace,
    ) -> FetchResult<F::Payload> {
        let mut last_error = String::new();

        for attempt in 0..self.policy.max_retries {
            self.limiter.acquire().await;
            counter!("fetch.attempts").increment(1);

            let outcome = AssertUnwindSafe(self.fetcher.fetch_one(identifier, marketplace))
                .catch_unwind()
                .await;

            last_error = match outcome {
                Ok(Ok(payload)) => {
                    debug!(identifier, attempt, "fetch succeeded");
                    return FetchResult::Success {
                        identifier: identifier.to_string(),
                        payload,
                    };
                }
                Ok(Err(err)) if err.is_permanent() => {
                    warn!(identifier, attempt, error = %err, "fetch rejected, not retrying");
                    counter!("fetch.failures", "kind" => ErrorKind::RemoteFailure.as_str())
                        .increment(1);
                    return FetchResult::failure(
                        identifier,
                        ErrorKind::RemoteFailure,
                        err.to_string(),
                    );
                }
                Ok(Err(err)) => err.to_string(),
                Err(panic) => format!("fetch panicked: {}", panic_message(panic.as_ref())),
            };

            warn!(
                identifier,
                attempt,
                max_retries = self.policy.max_retries,
                error = %last_error,
                "fetch attempt failed"
            );

            if attempt + 1 < self.policy.max_retries {
                counter!("fetch.retries").increment(1);
                sleep(self.policy.backoff(attempt)).await;
            }
        }

        counter!("fetch.failures", "kind" => ErrorKind::MaxRetriesExceeded.as_str()).increment(1);
        FetchResult::failure(
            identifier,
            ErrorKind::MaxRetriesExceeded,
            format!(
                "failed after {} attempts: {}",
                self.policy.max_retries, last_error
            ),
        )
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic"
    }
}
