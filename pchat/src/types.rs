//! Session, turn, and exchange types.

use std::fmt::{Display, Formatter};

use pcommon::{SessionId, TenantId, Timestamp, TurnId, UserId};
use pprovider::Role;

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSession {
    pub id: SessionId,
    pub owner: UserId,
    pub tenant: TenantId,
    pub title: String,
    pub model: String,
    pub system_directive: Option<String>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    /// `false` once the session is tombstoned.
    pub active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Number of non-deleted turns.
    pub message_count: u32,
}

impl ConversationSession {
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.owner == user
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub id: TurnId,
    pub session_id: SessionId,
    pub author: Option<UserId>,
    pub role: Role,
    pub content: String,
    /// Always set on assistant turns.
    pub model: Option<String>,
    pub token_count: Option<u32>,
    pub deleted: bool,
    pub edited: bool,
    /// Set on assistant turns persisted from an interrupted stream.
    pub truncated: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Input for creating a session; stores assign ids and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSession {
    pub owner: UserId,
    pub tenant: TenantId,
    pub title: String,
    pub model: Option<String>,
    pub system_directive: Option<String>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

impl NewSession {
    pub fn new(owner: UserId, tenant: TenantId, title: impl Into<String>) -> Self {
        Self {
            owner,
            tenant,
            title: title.into(),
            model: None,
            system_directive: None,
            temperature: None,
            max_output_tokens: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_system_directive(mut self, directive: impl Into<String>) -> Self {
        self.system_directive = Some(directive.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }
}

/// Partial session update; `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionUpdate {
    pub title: Option<String>,
    pub model: Option<String>,
    pub system_directive: Option<String>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

impl SessionUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Input for appending a turn; stores assign the id and creation timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTurn {
    pub role: Role,
    pub author: Option<UserId>,
    pub content: String,
    pub model: Option<String>,
    pub token_count: Option<u32>,
    pub truncated: bool,
}

impl NewTurn {
    pub fn user(author: UserId, content: impl Into<String>, token_count: u32) -> Self {
        Self {
            role: Role::User,
            author: Some(author),
            content: content.into(),
            model: None,
            token_count: Some(token_count),
            truncated: false,
        }
    }

    pub fn assistant(content: impl Into<String>, model: impl Into<String>, token_count: u32) -> Self {
        Self {
            role: Role::Assistant,
            author: None,
            content: content.into(),
            model: Some(model.into()),
            token_count: Some(token_count),
            truncated: false,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            author: None,
            content: content.into(),
            model: None,
            token_count: None,
            truncated: false,
        }
    }

    pub fn mark_truncated(mut self) -> Self {
        self.truncated = true;
        self
    }
}

/// A session together with its persisted turns in creation order.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub session: ConversationSession,
    pub turns: Vec<Turn>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageRequest {
    pub session_id: SessionId,
    pub caller: UserId,
    pub message: String,
}

impl SendMessageRequest {
    pub fn new(session_id: SessionId, caller: UserId, message: impl Into<String>) -> Self {
        Self {
            session_id,
            caller,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeResult {
    pub session_id: SessionId,
    pub user_turn: Turn,
    pub assistant_turn: Turn,
}

/// Steps of one exchange, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangePhase {
    ValidatingSession,
    PersistingUserTurn,
    AssemblingContext,
    AwaitingBackend,
    StreamingDeltas,
    ReceivingWholeReply,
    PersistingAssistantTurn,
    UpdatingSessionMetadata,
    Done,
}

impl ExchangePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ValidatingSession => "validating_session",
            Self::PersistingUserTurn => "persisting_user_turn",
            Self::AssemblingContext => "assembling_context",
            Self::AwaitingBackend => "awaiting_backend",
            Self::StreamingDeltas => "streaming_deltas",
            Self::ReceivingWholeReply => "receiving_whole_reply",
            Self::PersistingAssistantTurn => "persisting_assistant_turn",
            Self::UpdatingSessionMetadata => "updating_session_metadata",
            Self::Done => "done",
        }
    }
}

impl Display for ExchangePhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an assistant reply is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeMode {
    OneShot,
    Streaming,
}

impl ExchangeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneShot => "one_shot",
            Self::Streaming => "streaming",
        }
    }
}
