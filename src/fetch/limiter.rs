// Sliding-window rate limiter shared by every fetch in the process
//
// Keeps the timestamps of recent acquisitions. A caller that finds the window
// full sleeps until the oldest timestamp expires, then re-checks.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{sleep, Instant};
use tracing::trace;

use super::BatchError;

/// Admits at most `max_calls` acquisitions in any trailing `window`.
///
/// The window is half-open: a call made exactly `window` ago no longer counts.
/// Very short windows may over-throttle because wake-ups are subject to
/// scheduler latency.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    max_calls: usize,
    window: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(max_calls: usize, window: Duration) -> Result<Self, BatchError> {
        if max_calls == 0 {
            return Err(BatchError::invalid_setting(
                "rate limiter max_calls must be greater than 0",
            ));
        }
        if window.is_zero() {
            return Err(BatchError::invalid_setting(
                "rate limiter window must be greater than 0",
            ));
        }

        Ok(Self {
            max_calls,
            window,
            calls: Mutex::new(VecDeque::with_capacity(max_calls.min(1024))),
        })
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Wait until a call is permitted, then record it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut calls = self.calls.lock();
                let now = Instant::now();
                prune(&mut calls, now, self.window);

                if calls.len() < self.max_calls {
                    calls.push_back(now);
                    return;
                }

                // Non-empty after the length check; pruning leaves only calls
                // younger than the window so the wait is positive.
                let oldest = calls[0];
                self.window - now.duration_since(oldest)
            };

            trace!(wait_ms = wait.as_millis() as u64, "rate limit reached, waiting");
            sleep(wait).await;
        }
    }

    /// Number of acquisitions currently inside the window.
    pub fn calls_in_window(&self) -> usize {
        let calls = self.calls.lock();
        let now = Instant::now();
        calls
            .iter()
            .filter(|&&at| now.duration_since(at) < self.window)
            .count()
    }
}

fn prune(calls: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&oldest) = calls.front() {
        if now.duration_since(oldest) >= window {
            calls.pop_front();
        } else {
            break;
        }
    }
}
