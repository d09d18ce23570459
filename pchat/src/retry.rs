//! Bounded retries for the writes that follow a successful backend call.
//!
//! A reply the backend already produced is worth a few more store attempts.
//! Only errors flagged `retryable` (busy or locked databases, dropped
//! connections) are retried; the delay doubles per attempt up to a ceiling.
//!
//! ```rust
//! use std::time::Duration;
//!
//! use pchat::RetryPolicy;
//!
//! let policy = RetryPolicy::new(4).with_initial_backoff(Duration::from_millis(50));
//! assert_eq!(policy.delay_after(1), Duration::from_millis(50));
//! assert_eq!(policy.delay_after(3), Duration::from_millis(200));
//! ```

use std::future::Future;
use std::time::Duration;

use crate::ChatError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; never below one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    pub fn with_initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Whether a failure on `attempt` (1-based) earns another try.
    pub fn allows_another(&self, attempt: u32, error: &ChatError) -> bool {
        error.retryable && attempt < self.max_attempts
    }

    /// Pause before the attempt that follows `attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(31);
        self.initial_backoff
            .saturating_mul(1_u32 << doublings)
            .min(self.max_backoff)
    }
}

/// Observes persistence retries. Every method defaults to a no-op.
pub trait RetryHooks: Send + Sync {
    fn on_attempt_start(&self, _operation: &str, _attempt: u32) {}

    fn on_retry_scheduled(
        &self,
        _operation: &str,
        _attempt: u32,
        _delay: Duration,
        _error: &ChatError,
    ) {
    }

    fn on_success(&self, _operation: &str, _attempts: u32) {}

    fn on_failure(&self, _operation: &str, _attempts: u32, _error: &ChatError) {}
}

/// Runs `write` until it succeeds, fails permanently, or the policy runs out.
///
/// `sleep` is injected so callers pick the timer and tests can skip waiting.
pub async fn execute_with_retry<T, H, Write, WriteFuture, Sleep, SleepFuture>(
    operation: &str,
    policy: &RetryPolicy,
    hooks: &H,
    mut write: Write,
    mut sleep: Sleep,
) -> Result<T, ChatError>
where
    H: RetryHooks + ?Sized,
    Write: FnMut(u32) -> WriteFuture,
    WriteFuture: Future<Output = Result<T, ChatError>>,
    Sleep: FnMut(Duration) -> SleepFuture,
    SleepFuture: Future<Output = ()>,
{
    let mut attempt = 1;
    loop {
        hooks.on_attempt_start(operation, attempt);

        let error = match write(attempt).await {
            Ok(value) => {
                hooks.on_success(operation, attempt);
                return Ok(value);
            }
            Err(error) => error,
        };

        if !policy.allows_another(attempt, &error) {
            hooks.on_failure(operation, attempt, &error);
            return Err(error);
        }

        let delay = policy.delay_after(attempt);
        hooks.on_retry_scheduled(operation, attempt, delay, &error);
        sleep(delay).await;
        attempt += 1;
    }
}
