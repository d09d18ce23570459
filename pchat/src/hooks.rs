//! Hook contracts for observing exchanges and persistence retries.
//!
//! ```rust
//! use pchat::{ConversationHooks, NoopConversationHooks};
//!
//! fn accepts_hooks(_hooks: &dyn ConversationHooks) {}
//!
//! let hooks = NoopConversationHooks;
//! accepts_hooks(&hooks);
//! ```

use std::time::Duration;

use pcommon::SessionId;

use crate::{ChatError, ExchangeMode, ExchangePhase, RetryHooks};

pub trait ConversationHooks: RetryHooks {
    fn on_phase_start(&self, _phase: ExchangePhase, _session_id: &SessionId) {}

    fn on_delta(&self, _session_id: &SessionId, _delta: &str) {}

    fn on_exchange_success(
        &self,
        _mode: ExchangeMode,
        _session_id: &SessionId,
        _elapsed: Duration,
    ) {
    }

    fn on_exchange_failure(
        &self,
        _mode: ExchangeMode,
        _session_id: &SessionId,
        _error: &ChatError,
        _elapsed: Duration,
    ) {
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopConversationHooks;

impl RetryHooks for NoopConversationHooks {}

impl ConversationHooks for NoopConversationHooks {}
