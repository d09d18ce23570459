//! Tracing-based hooks for exchange phases, streamed deltas, and persistence retries.
//!
//! ```rust
//! use pchat::ConversationHooks;
//! use pobserve::TracingConversationHooks;
//!
//! fn accepts_hooks(_hooks: &dyn ConversationHooks) {}
//!
//! let hooks = TracingConversationHooks;
//! accepts_hooks(&hooks);
//! ```

use std::time::Duration;

use pchat::{ChatError, ConversationHooks, ExchangeMode, ExchangePhase, RetryHooks};
use pcommon::SessionId;

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingConversationHooks;

impl RetryHooks for TracingConversationHooks {
    fn on_attempt_start(&self, operation: &str, attempt: u32) {
        tracing::debug!(phase = "persistence", event = "attempt_start", operation, attempt);
    }

    fn on_retry_scheduled(&self, operation: &str, attempt: u32, delay: Duration, error: &ChatError) {
        tracing::warn!(
            phase = "persistence",
            event = "retry_scheduled",
            operation,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error_kind = ?error.kind,
            retryable = error.retryable,
            error = %error
        );
    }

    fn on_success(&self, operation: &str, attempts: u32) {
        tracing::debug!(phase = "persistence", event = "success", operation, attempts);
    }

    fn on_failure(&self, operation: &str, attempts: u32, error: &ChatError) {
        tracing::error!(
            phase = "persistence",
            event = "failure",
            operation,
            attempts,
            error_kind = ?error.kind,
            retryable = error.retryable,
            error = %error
        );
    }
}

impl ConversationHooks for TracingConversationHooks {
    fn on_phase_start(&self, phase: ExchangePhase, session_id: &SessionId) {
        tracing::info!(
            phase = "exchange",
            event = "phase_start",
            exchange_phase = phase.as_str(),
            session_id = %session_id
        );
    }

    fn on_delta(&self, session_id: &SessionId, delta: &str) {
        tracing::trace!(
            phase = "exchange",
            event = "delta",
            session_id = %session_id,
            delta_chars = delta.chars().count()
        );
    }

    fn on_exchange_success(&self, mode: ExchangeMode, session_id: &SessionId, elapsed: Duration) {
        tracing::info!(
            phase = "exchange",
            event = "success",
            mode = mode.as_str(),
            session_id = %session_id,
            elapsed_ms = elapsed.as_millis() as u64
        );
    }

    fn on_exchange_failure(
        &self,
        mode: ExchangeMode,
        session_id: &SessionId,
        error: &ChatError,
        elapsed: Duration,
    ) {
        tracing::error!(
            phase = "exchange",
            event = "failure",
            mode = mode.as_str(),
            session_id = %session_id,
            exchange_phase = error.phase.map(ExchangePhase::as_str),
            error_kind = ?error.kind,
            retryable = error.retryable,
            elapsed_ms = elapsed.as_millis() as u64,
            error = %error
        );
    }
}
