use std::sync::{Arc, Mutex};
use std::time::Duration;

use pchat::{ChatError, ConversationHooks, ExchangeMode, ExchangePhase, RetryHooks};
use pcommon::SessionId;

use crate::{
    FanoutConversationHooks, MetricsConversationHooks, SafeConversationHooks,
    TracingConversationHooks,
};

fn exercise_all_callbacks(hooks: &dyn ConversationHooks) {
    let session_id = SessionId::from("session-1");
    let store_error = ChatError::store("database busy", true)
        .in_phase(ExchangePhase::PersistingAssistantTurn);

    hooks.on_attempt_start("append_assistant_turn", 1);
    hooks.on_retry_scheduled(
        "append_assistant_turn",
        1,
        Duration::from_millis(10),
        &store_error,
    );
    hooks.on_success("append_assistant_turn", 2);
    hooks.on_failure("touch_session", 3, &store_error);

    hooks.on_phase_start(ExchangePhase::ValidatingSession, &session_id);
    hooks.on_delta(&session_id, "Hel");
    hooks.on_exchange_success(ExchangeMode::Streaming, &session_id, Duration::from_millis(30));
    hooks.on_exchange_failure(
        ExchangeMode::OneShot,
        &session_id,
        &store_error,
        Duration::from_millis(30),
    );
}

#[test]
fn tracing_hooks_smoke_test_all_callbacks() {
    exercise_all_callbacks(&TracingConversationHooks);
}

#[test]
fn metrics_hooks_smoke_test_all_callbacks() {
    exercise_all_callbacks(&MetricsConversationHooks);
}

#[derive(Default, Clone)]
struct RecordingHooks {
    events: Arc<Mutex<Vec<&'static str>>>,
}

impl RecordingHooks {
    fn record(&self, event: &'static str) {
        self.events.lock().expect("events lock").push(event);
    }
}

impl RetryHooks for RecordingHooks {
    fn on_retry_scheduled(&self, _operation: &str, _attempt: u32, _delay: Duration, _error: &ChatError) {
        self.record("retry_scheduled");
    }

    fn on_failure(&self, _operation: &str, _attempts: u32, _error: &ChatError) {
        self.record("retry_failure");
    }
}

impl ConversationHooks for RecordingHooks {
    fn on_phase_start(&self, _phase: ExchangePhase, _session_id: &SessionId) {
        self.record("phase_start");
    }

    fn on_delta(&self, _session_id: &SessionId, _delta: &str) {
        self.record("delta");
    }

    fn on_exchange_success(&self, _mode: ExchangeMode, _session_id: &SessionId, _elapsed: Duration) {
        self.record("success");
    }

    fn on_exchange_failure(
        &self,
        _mode: ExchangeMode,
        _session_id: &SessionId,
        _error: &ChatError,
        _elapsed: Duration,
    ) {
        self.record("failure");
    }
}

struct PanickingHooks;

impl RetryHooks for PanickingHooks {
    fn on_success(&self, _operation: &str, _attempts: u32) {
        panic!("retry hook panic");
    }
}

impl ConversationHooks for PanickingHooks {
    fn on_phase_start(&self, _phase: ExchangePhase, _session_id: &SessionId) {
        panic!("phase hook panic");
    }

    fn on_delta(&self, _session_id: &SessionId, _delta: &str) {
        panic!("delta hook panic");
    }
}

#[test]
fn safe_hooks_swallow_panics() {
    exercise_all_callbacks(&SafeConversationHooks::new(PanickingHooks));
}

#[test]
fn safe_hooks_forward_to_inner_hooks() {
    let recording = RecordingHooks::default();
    exercise_all_callbacks(&SafeConversationHooks::new(recording.clone()));

    let events = recording.events.lock().expect("events lock").clone();
    assert_eq!(
        events,
        vec![
            "retry_scheduled",
            "retry_failure",
            "phase_start",
            "delta",
            "success",
            "failure",
        ]
    );
}

#[test]
fn fanout_hooks_forward_to_each_hook_in_order() {
    let first = RecordingHooks::default();
    let second = RecordingHooks::default();
    let fanout = FanoutConversationHooks::new()
        .with(Arc::new(first.clone()))
        .with(Arc::new(SafeConversationHooks::new(PanickingHooks)))
        .with(Arc::new(second.clone()));
    assert_eq!(fanout.len(), 3);

    fanout.on_delta(&SessionId::from("session-1"), "x");
    fanout.on_phase_start(ExchangePhase::Done, &SessionId::from("session-1"));

    assert_eq!(
        first.events.lock().expect("events lock").clone(),
        vec!["delta", "phase_start"]
    );
    assert_eq!(
        second.events.lock().expect("events lock").clone(),
        vec!["delta", "phase_start"]
    );
}
