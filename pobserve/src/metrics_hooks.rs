//! Metrics-based hooks for exchanges and persistence retries.
//!
//! ```rust
//! use pchat::RetryHooks;
//! use pobserve::MetricsConversationHooks;
//!
//! fn accepts_retry_hooks(_hooks: &dyn RetryHooks) {}
//!
//! let hooks = MetricsConversationHooks;
//! accepts_retry_hooks(&hooks);
//! ```

use std::time::Duration;

use pchat::{ChatError, ConversationHooks, ExchangeMode, ExchangePhase, RetryHooks};
use pcommon::SessionId;

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsConversationHooks;

impl RetryHooks for MetricsConversationHooks {
    fn on_retry_scheduled(&self, operation: &str, _attempt: u32, delay: Duration, error: &ChatError) {
        metrics::counter!(
            "palaver_persistence_retry_scheduled_total",
            "operation" => operation.to_string(),
            "error_kind" => format!("{:?}", error.kind)
        )
        .increment(1);
        metrics::histogram!(
            "palaver_persistence_retry_delay_seconds",
            "operation" => operation.to_string()
        )
        .record(delay.as_secs_f64());
    }

    fn on_success(&self, operation: &str, attempts: u32) {
        metrics::histogram!(
            "palaver_persistence_attempts_per_success",
            "operation" => operation.to_string()
        )
        .record(attempts as f64);
    }

    fn on_failure(&self, operation: &str, attempts: u32, error: &ChatError) {
        metrics::counter!(
            "palaver_persistence_failure_total",
            "operation" => operation.to_string(),
            "error_kind" => format!("{:?}", error.kind)
        )
        .increment(1);
        metrics::histogram!(
            "palaver_persistence_attempts_per_failure",
            "operation" => operation.to_string()
        )
        .record(attempts as f64);
    }
}

impl ConversationHooks for MetricsConversationHooks {
    fn on_phase_start(&self, phase: ExchangePhase, _session_id: &SessionId) {
        metrics::counter!(
            "palaver_exchange_phase_start_total",
            "phase" => phase.as_str()
        )
        .increment(1);
    }

    fn on_delta(&self, _session_id: &SessionId, delta: &str) {
        metrics::counter!("palaver_stream_deltas_total").increment(1);
        metrics::counter!("palaver_stream_delta_bytes_total").increment(delta.len() as u64);
    }

    fn on_exchange_success(&self, mode: ExchangeMode, _session_id: &SessionId, elapsed: Duration) {
        metrics::counter!(
            "palaver_exchange_success_total",
            "mode" => mode.as_str()
        )
        .increment(1);
        metrics::histogram!(
            "palaver_exchange_duration_seconds",
            "mode" => mode.as_str(),
            "outcome" => "success"
        )
        .record(elapsed.as_secs_f64());
    }

    fn on_exchange_failure(
        &self,
        mode: ExchangeMode,
        _session_id: &SessionId,
        error: &ChatError,
        elapsed: Duration,
    ) {
        metrics::counter!(
            "palaver_exchange_failure_total",
            "mode" => mode.as_str(),
            "error_kind" => format!("{:?}", error.kind),
            "phase" => error.phase.map(ExchangePhase::as_str).unwrap_or("none")
        )
        .increment(1);
        metrics::histogram!(
            "palaver_exchange_duration_seconds",
            "mode" => mode.as_str(),
            "outcome" => "failure"
        )
        .record(elapsed.as_secs_f64());
    }
}
