use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use pchat::{ChatError, ConversationHooks, ExchangeMode, ExchangePhase, RetryHooks};
use pcommon::SessionId;

/// Swallows panics raised by the wrapped hooks so observers never abort an exchange.
pub struct SafeConversationHooks<H> {
    inner: H,
}

impl<H> SafeConversationHooks<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

impl<H> RetryHooks for SafeConversationHooks<H>
where
    H: RetryHooks,
{
    fn on_attempt_start(&self, operation: &str, attempt: u32) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_attempt_start(operation, attempt)
        }));
    }

    fn on_retry_scheduled(&self, operation: &str, attempt: u32, delay: Duration, error: &ChatError) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner
                .on_retry_scheduled(operation, attempt, delay, error)
        }));
    }

    fn on_success(&self, operation: &str, attempts: u32) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_success(operation, attempts)
        }));
    }

    fn on_failure(&self, operation: &str, attempts: u32, error: &ChatError) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_failure(operation, attempts, error)
        }));
    }
}

impl<H> ConversationHooks for SafeConversationHooks<H>
where
    H: ConversationHooks,
{
    fn on_phase_start(&self, phase: ExchangePhase, session_id: &SessionId) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_phase_start(phase, session_id)
        }));
    }

    fn on_delta(&self, session_id: &SessionId, delta: &str) {
        let _ = catch_unwind(AssertUnwindSafe(|| self.inner.on_delta(session_id, delta)));
    }

    fn on_exchange_success(&self, mode: ExchangeMode, session_id: &SessionId, elapsed: Duration) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_exchange_success(mode, session_id, elapsed)
        }));
    }

    fn on_exchange_failure(
        &self,
        mode: ExchangeMode,
        session_id: &SessionId,
        error: &ChatError,
        elapsed: Duration,
    ) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner
                .on_exchange_failure(mode, session_id, error, elapsed)
        }));
    }
}
