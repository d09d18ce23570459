use std::sync::Arc;
use std::time::Duration;

use pchat::{ChatError, ConversationHooks, ExchangeMode, ExchangePhase, RetryHooks};
use pcommon::SessionId;

/// Forwards every callback to each registered hook set in registration order.
#[derive(Clone, Default)]
pub struct FanoutConversationHooks {
    hooks: Vec<Arc<dyn ConversationHooks>>,
}

impl FanoutConversationHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, hooks: Arc<dyn ConversationHooks>) -> Self {
        self.hooks.push(hooks);
        self
    }

    pub fn push(&mut self, hooks: Arc<dyn ConversationHooks>) {
        self.hooks.push(hooks);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl RetryHooks for FanoutConversationHooks {
    fn on_attempt_start(&self, operation: &str, attempt: u32) {
        for hooks in &self.hooks {
            hooks.on_attempt_start(operation, attempt);
        }
    }

    fn on_retry_scheduled(&self, operation: &str, attempt: u32, delay: Duration, error: &ChatError) {
        for hooks in &self.hooks {
            hooks.on_retry_scheduled(operation, attempt, delay, error);
        }
    }

    fn on_success(&self, operation: &str, attempts: u32) {
        for hooks in &self.hooks {
            hooks.on_success(operation, attempts);
        }
    }

    fn on_failure(&self, operation: &str, attempts: u32, error: &ChatError) {
        for hooks in &self.hooks {
            hooks.on_failure(operation, attempts, error);
        }
    }
}

impl ConversationHooks for FanoutConversationHooks {
    fn on_phase_start(&self, phase: ExchangePhase, session_id: &SessionId) {
        for hooks in &self.hooks {
            hooks.on_phase_start(phase, session_id);
        }
    }

    fn on_delta(&self, session_id: &SessionId, delta: &str) {
        for hooks in &self.hooks {
            hooks.on_delta(session_id, delta);
        }
    }

    fn on_exchange_success(&self, mode: ExchangeMode, session_id: &SessionId, elapsed: Duration) {
        for hooks in &self.hooks {
            hooks.on_exchange_success(mode, session_id, elapsed);
        }
    }

    fn on_exchange_failure(
        &self,
        mode: ExchangeMode,
        session_id: &SessionId,
        error: &ChatError,
        elapsed: Duration,
    ) {
        for hooks in &self.hooks {
            hooks.on_exchange_failure(mode, session_id, error, elapsed);
        }
    }
}
