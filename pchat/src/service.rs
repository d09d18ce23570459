//! Conversation service: session lifecycle plus one-shot and streamed exchanges.
//!
//! An exchange moves through [`ExchangePhase`] in order. Validation failures
//! write nothing. Once the user turn is committed it is kept even when the
//! backend fails afterwards; the assistant turn is written only when a reply
//! exists.

use std::sync::Arc;
use std::time::Instant;

use futures_util::StreamExt;
use pcommon::{SessionId, TurnId, UserId};
use pprovider::{CompletionOrchestrator, CompletionRequest};
use tokio_util::sync::CancellationToken;

use crate::{
    ChatError, ChatErrorKind, ConversationAssembler, ConversationHooks, ConversationSession, ConversationStore,
    DeltaSink, ExchangeMode, ExchangePhase, ExchangeResult, NewSession, NewTurn,
    NoopConversationHooks, RetryPolicy, SendMessageRequest, SessionSnapshot, SessionUpdate, Turn,
    execute_with_retry,
};

pub const DEFAULT_SESSION_MODEL: &str = "gpt-3.5-turbo";

/// What to do with text already streamed when an exchange is interrupted by
/// cancellation or a failing sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartialReplyPolicy {
    /// Persist nothing and report the interruption.
    #[default]
    Discard,
    /// Persist non-empty partial text as an assistant turn flagged `truncated`.
    PersistTruncated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationPolicy {
    pub partial_reply: PartialReplyPolicy,
    /// Applies to the assistant-turn write and the session bookkeeping write.
    pub persist_retry: RetryPolicy,
    pub default_session_model: String,
}

impl Default for ConversationPolicy {
    fn default() -> Self {
        Self {
            partial_reply: PartialReplyPolicy::Discard,
            persist_retry: RetryPolicy::default(),
            default_session_model: DEFAULT_SESSION_MODEL.to_string(),
        }
    }
}

pub struct ConversationServiceBuilder {
    orchestrator: CompletionOrchestrator,
    store: Arc<dyn ConversationStore>,
    hooks: Arc<dyn ConversationHooks>,
    policy: ConversationPolicy,
}

impl ConversationServiceBuilder {
    pub fn new(orchestrator: CompletionOrchestrator, store: Arc<dyn ConversationStore>) -> Self {
        Self {
            orchestrator,
            store,
            hooks: Arc::new(NoopConversationHooks),
            policy: ConversationPolicy::default(),
        }
    }

    pub fn hooks(mut self, hooks: Arc<dyn ConversationHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn policy(mut self, policy: ConversationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn partial_reply(mut self, partial_reply: PartialReplyPolicy) -> Self {
        self.policy.partial_reply = partial_reply;
        self
    }

    pub fn persist_retry(mut self, persist_retry: RetryPolicy) -> Self {
        self.policy.persist_retry = persist_retry;
        self
    }

    pub fn default_session_model(mut self, model: impl Into<String>) -> Self {
        self.policy.default_session_model = model.into();
        self
    }

    pub fn build(self) -> ConversationService {
        ConversationService {
            orchestrator: self.orchestrator,
            store: self.store,
            hooks: self.hooks,
            policy: self.policy,
        }
    }
}

#[derive(Clone)]
pub struct ConversationService {
    orchestrator: CompletionOrchestrator,
    store: Arc<dyn ConversationStore>,
    hooks: Arc<dyn ConversationHooks>,
    policy: ConversationPolicy,
}

struct PreparedExchange {
    session: ConversationSession,
    user_turn: Turn,
    request: CompletionRequest,
}

impl ConversationService {
    pub fn builder(
        orchestrator: CompletionOrchestrator,
        store: Arc<dyn ConversationStore>,
    ) -> ConversationServiceBuilder {
        ConversationServiceBuilder::new(orchestrator, store)
    }

    pub fn new(orchestrator: CompletionOrchestrator, store: Arc<dyn ConversationStore>) -> Self {
        Self::builder(orchestrator, store).build()
    }

    pub fn policy(&self) -> &ConversationPolicy {
        &self.policy
    }

    pub fn orchestrator(&self) -> &CompletionOrchestrator {
        &self.orchestrator
    }

    pub async fn start_session(
        &self,
        mut session: NewSession,
    ) -> Result<ConversationSession, ChatError> {
        validate_generation_settings(session.temperature, session.max_output_tokens)?;

        let model = session
            .model
            .take()
            .filter(|model| !model.trim().is_empty())
            .unwrap_or_else(|| self.policy.default_session_model.clone());
        session.model = Some(model);

        self.store.create_session(session).await
    }

    pub async fn get_session(
        &self,
        session_id: &SessionId,
        caller: &UserId,
    ) -> Result<ConversationSession, ChatError> {
        Ok(self.owned_snapshot(session_id, caller).await?.session)
    }

    /// Active sessions of `caller`, most recently updated first.
    pub async fn list_sessions(&self, caller: &UserId) -> Result<Vec<ConversationSession>, ChatError> {
        let sessions = self.store.list_sessions(caller).await?;
        Ok(sessions.into_iter().filter(|session| session.active).collect())
    }

    /// Applies the non-blank fields of `update`.
    pub async fn update_session(
        &self,
        session_id: &SessionId,
        caller: &UserId,
        update: SessionUpdate,
    ) -> Result<ConversationSession, ChatError> {
        self.owned_snapshot(session_id, caller).await?;
        validate_generation_settings(update.temperature, update.max_output_tokens)?;

        let non_blank = |value: Option<String>| value.filter(|text| !text.trim().is_empty());
        let update = SessionUpdate {
            title: non_blank(update.title),
            model: non_blank(update.model),
            system_directive: non_blank(update.system_directive),
            temperature: update.temperature,
            max_output_tokens: update.max_output_tokens,
        };

        self.store.update_session(session_id, update).await
    }

    /// Non-deleted turns of an owned, active session in creation order.
    pub async fn list_turns(
        &self,
        session_id: &SessionId,
        caller: &UserId,
    ) -> Result<Vec<Turn>, ChatError> {
        self.owned_snapshot(session_id, caller).await?;
        self.store.list_turns(session_id).await
    }

    /// Soft-deletes one turn; deleted turns are excluded from later context assembly.
    pub async fn delete_turn(
        &self,
        session_id: &SessionId,
        caller: &UserId,
        turn_id: &TurnId,
    ) -> Result<(), ChatError> {
        self.owned_snapshot(session_id, caller).await?;
        if self.store.delete_turn(session_id, turn_id).await? {
            Ok(())
        } else {
            Err(ChatError::new(
                ChatErrorKind::ValidationFailure,
                format!("turn '{turn_id}' not found"),
                false,
            ))
        }
    }

    /// Tombstones an owned session; it is reported as not found afterwards.
    pub async fn end_session(&self, session_id: &SessionId, caller: &UserId) -> Result<(), ChatError> {
        self.owned_snapshot(session_id, caller).await?;
        if self.store.end_session(session_id).await? {
            Ok(())
        } else {
            Err(ChatError::session_not_found())
        }
    }

    /// Awaits the whole reply, then persists it.
    ///
    /// `cancel` is observed before the user turn is written and while the
    /// backend call is pending. A reply that arrives after cancellation is
    /// kept only under [`PartialReplyPolicy::PersistTruncated`].
    pub async fn send_message(
        &self,
        request: SendMessageRequest,
        cancel: &CancellationToken,
    ) -> Result<ExchangeResult, ChatError> {
        let started = Instant::now();
        let result = self.run_one_shot(&request, cancel).await;
        self.report(ExchangeMode::OneShot, &request.session_id, &result, started);
        result
    }

    /// Streams the reply into `sink` while accumulating it for persistence.
    ///
    /// `cancel` is observed while waiting for the backend, before each delta
    /// read, and before each persistence write. A delta the sink accepted is
    /// always part of the accumulated reply. A write already in flight is
    /// never interrupted.
    pub async fn send_message_streaming(
        &self,
        request: SendMessageRequest,
        sink: &mut dyn DeltaSink,
        cancel: &CancellationToken,
    ) -> Result<ExchangeResult, ChatError> {
        let started = Instant::now();
        let result = self.run_streaming(&request, sink, cancel).await;
        self.report(ExchangeMode::Streaming, &request.session_id, &result, started);
        result
    }

    async fn run_one_shot(
        &self,
        request: &SendMessageRequest,
        cancel: &CancellationToken,
    ) -> Result<ExchangeResult, ChatError> {
        let PreparedExchange {
            session,
            user_turn,
            request: completion_request,
        } = self.begin_exchange(request, cancel).await?;

        let phase = ExchangePhase::AwaitingBackend;
        self.hooks.on_phase_start(phase, &session.id);
        let completion = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ChatError::cancelled().in_phase(phase)),
            completion = self
                .orchestrator
                .generate(Some(&session.tenant), completion_request) => completion,
        }
        .map_err(|error| ChatError::from(error).in_phase(phase))?;

        self.hooks
            .on_phase_start(ExchangePhase::ReceivingWholeReply, &session.id);
        if cancel.is_cancelled() && self.policy.partial_reply == PartialReplyPolicy::Discard {
            return Err(ChatError::cancelled().in_phase(ExchangePhase::PersistingAssistantTurn));
        }
        self.finish_exchange(&session, user_turn, completion.content, false)
            .await
    }

    async fn run_streaming(
        &self,
        request: &SendMessageRequest,
        sink: &mut dyn DeltaSink,
        cancel: &CancellationToken,
    ) -> Result<ExchangeResult, ChatError> {
        let PreparedExchange {
            session,
            user_turn,
            request: completion_request,
        } = self.begin_exchange(request, cancel).await?;

        let mut phase = ExchangePhase::AwaitingBackend;
        self.hooks.on_phase_start(phase, &session.id);

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            opened = self
                .orchestrator
                .generate_streaming(Some(&session.tenant), completion_request) => Some(opened),
        };
        let mut deltas = match opened {
            Some(opened) => opened.map_err(|error| ChatError::from(error).in_phase(phase))?,
            None => return Err(ChatError::cancelled().in_phase(phase)),
        };

        let mut accumulated = String::new();
        let interruption = loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Some(ChatError::cancelled()),
                next = deltas.next() => next,
            };

            let delta = match next {
                Some(Ok(delta)) => delta,
                Some(Err(error)) => return Err(ChatError::from(error).in_phase(phase)),
                None => break None,
            };

            if phase != ExchangePhase::StreamingDeltas {
                phase = ExchangePhase::StreamingDeltas;
                self.hooks.on_phase_start(phase, &session.id);
            }

            // Not raced against `cancel`: once delivered, a delta belongs to the reply.
            if let Err(error) = sink.accept(&delta).await {
                break Some(ChatError::sink(error.message));
            }

            self.hooks.on_delta(&session.id, &delta);
            accumulated.push_str(&delta);
        };
        drop(deltas);

        match interruption {
            None if accumulated.is_empty() => Err(ChatError::no_completion(
                "backend stream ended without producing any text",
            )
            .in_phase(phase)),
            None if cancel.is_cancelled()
                && self.policy.partial_reply == PartialReplyPolicy::Discard =>
            {
                Err(ChatError::cancelled().in_phase(ExchangePhase::PersistingAssistantTurn))
            }
            None => {
                self.finish_exchange(&session, user_turn, accumulated, false)
                    .await
            }
            Some(error) => match self.policy.partial_reply {
                PartialReplyPolicy::PersistTruncated if !accumulated.is_empty() => {
                    self.finish_exchange(&session, user_turn, accumulated, true)
                        .await
                }
                _ => Err(error.in_phase(phase)),
            },
        }
    }

    /// Validates the session and message, persists the user turn, and assembles the request.
    async fn begin_exchange(
        &self,
        request: &SendMessageRequest,
        cancel: &CancellationToken,
    ) -> Result<PreparedExchange, ChatError> {
        let session_id = &request.session_id;

        let phase = ExchangePhase::ValidatingSession;
        self.hooks.on_phase_start(phase, session_id);
        if request.message.trim().is_empty() {
            return Err(ChatError::invalid_request("message must not be empty").in_phase(phase));
        }

        let SessionSnapshot {
            session,
            turns: prior,
        } = self
            .owned_snapshot(session_id, &request.caller)
            .await
            .map_err(|error| error.in_phase(phase))?;

        if !self
            .orchestrator
            .is_model_available(Some(&session.tenant), &session.model)
        {
            return Err(ChatError::invalid_request(format!(
                "model '{}' is not available",
                session.model
            ))
            .in_phase(phase));
        }

        let phase = ExchangePhase::PersistingUserTurn;
        self.hooks.on_phase_start(phase, session_id);
        if cancel.is_cancelled() {
            return Err(ChatError::cancelled().in_phase(phase));
        }

        let token_count = self
            .orchestrator
            .count_tokens(Some(&session.tenant), &request.message, &session.model)
            .await;
        let user_turn = self
            .store
            .append_turn(
                session_id,
                NewTurn::user(request.caller.clone(), request.message.clone(), token_count),
            )
            .await
            .map_err(|error| error.in_phase(phase))?;

        self.hooks
            .on_phase_start(ExchangePhase::AssemblingContext, session_id);
        let messages = ConversationAssembler::assemble(
            session.system_directive.as_deref(),
            &prior,
            &request.message,
        );

        let mut completion_request = CompletionRequest::new(session.model.clone(), messages);
        if let Some(temperature) = session.temperature {
            completion_request = completion_request.with_temperature(temperature);
        }
        if let Some(max_tokens) = session.max_output_tokens {
            completion_request = completion_request.with_max_tokens(max_tokens);
        }

        Ok(PreparedExchange {
            session,
            user_turn,
            request: completion_request,
        })
    }

    /// Persists the assistant turn and bumps session metadata, retrying both writes.
    async fn finish_exchange(
        &self,
        session: &ConversationSession,
        user_turn: Turn,
        content: String,
        truncated: bool,
    ) -> Result<ExchangeResult, ChatError> {
        let phase = ExchangePhase::PersistingAssistantTurn;
        self.hooks.on_phase_start(phase, &session.id);

        let token_count = self
            .orchestrator
            .count_tokens(Some(&session.tenant), &content, &session.model)
            .await;
        let mut new_turn = NewTurn::assistant(content, session.model.clone(), token_count);
        if truncated {
            new_turn = new_turn.mark_truncated();
        }

        let store = &self.store;
        let session_id = &session.id;
        let assistant_turn = execute_with_retry(
            "append_assistant_turn",
            &self.policy.persist_retry,
            self.hooks.as_ref(),
            move |_| store.append_turn(session_id, new_turn.clone()),
            futures_timer::Delay::new,
        )
        .await
        .map_err(|error| error.in_phase(phase))?;

        let phase = ExchangePhase::UpdatingSessionMetadata;
        self.hooks.on_phase_start(phase, session_id);
        execute_with_retry(
            "touch_session",
            &self.policy.persist_retry,
            self.hooks.as_ref(),
            move |_| store.touch_session(session_id),
            futures_timer::Delay::new,
        )
        .await
        .map_err(|error| error.in_phase(phase))?;

        self.hooks.on_phase_start(ExchangePhase::Done, session_id);
        Ok(ExchangeResult {
            session_id: session_id.clone(),
            user_turn,
            assistant_turn,
        })
    }

    /// Missing, tombstoned, and foreign sessions are indistinguishable to the caller.
    async fn owned_snapshot(
        &self,
        session_id: &SessionId,
        caller: &UserId,
    ) -> Result<SessionSnapshot, ChatError> {
        match self.store.load_session(session_id).await? {
            Some(snapshot) if snapshot.session.active && snapshot.session.is_owned_by(caller) => {
                Ok(snapshot)
            }
            _ => Err(ChatError::session_not_found()),
        }
    }

    fn report(
        &self,
        mode: ExchangeMode,
        session_id: &SessionId,
        result: &Result<ExchangeResult, ChatError>,
        started: Instant,
    ) {
        match result {
            Ok(_) => self
                .hooks
                .on_exchange_success(mode, session_id, started.elapsed()),
            Err(error) => {
                self.hooks
                    .on_exchange_failure(mode, session_id, error, started.elapsed())
            }
        }
    }
}

fn validate_generation_settings(
    temperature: Option<f32>,
    max_output_tokens: Option<u32>,
) -> Result<(), ChatError> {
    if let Some(temperature) = temperature
        && !(0.0..=2.0).contains(&temperature)
    {
        return Err(ChatError::invalid_request(
            "temperature must be in the inclusive range 0.0..=2.0",
        ));
    }

    if max_output_tokens == Some(0) {
        return Err(ChatError::invalid_request(
            "max output tokens must be greater than zero",
        ));
    }

    Ok(())
}
