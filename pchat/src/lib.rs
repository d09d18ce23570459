//! Conversation sessions and exchanges over the completion orchestrator.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use pchat::prelude::*;
//! use pprovider::{CompletionOrchestrator, GatewayRegistry, PlaceholderCredentials};
//!
//! let orchestrator = CompletionOrchestrator::new(
//!     Arc::new(GatewayRegistry::new()),
//!     Arc::new(PlaceholderCredentials),
//! );
//! let service = ConversationService::new(orchestrator, Arc::new(InMemoryConversationStore::new()));
//! assert_eq!(service.policy().partial_reply, PartialReplyPolicy::Discard);
//! ```

mod assembler;
mod error;
mod hooks;
mod retry;
mod service;
mod sink;
mod store;
mod types;

pub mod prelude {
    pub use crate::{
        ChatError, ChatErrorKind, ChannelDeltaSink, ConversationHooks, ConversationPolicy,
        ConversationService, ConversationServiceBuilder, ConversationSession, ConversationStore,
        DeltaSink, ExchangeMode, ExchangePhase, ExchangeResult, FnDeltaSink,
        InMemoryConversationStore, NewSession, PartialReplyPolicy, SendMessageRequest,
        SessionUpdate, Turn,
    };
    pub use pcommon::{SessionId, TenantId, TurnId, UserId};
    pub use tokio_util::sync::CancellationToken;
}

pub use assembler::ConversationAssembler;
pub use error::{ChatError, ChatErrorKind};
pub use hooks::{ConversationHooks, NoopConversationHooks};
pub use retry::{RetryHooks, RetryPolicy, execute_with_retry};
pub use service::{
    ConversationPolicy, ConversationService, ConversationServiceBuilder, DEFAULT_SESSION_MODEL,
    PartialReplyPolicy,
};
pub use sink::{ChannelDeltaSink, DeltaSink, FnDeltaSink};
pub use store::{ConversationStore, InMemoryConversationStore};
pub use types::{
    ConversationSession, ExchangeMode, ExchangePhase, ExchangeResult, NewSession, NewTurn,
    SendMessageRequest, SessionSnapshot, SessionUpdate, Turn,
};
pub use pcommon::{SessionId, TenantId, TurnId, UserId};
pub use tokio_util::sync::CancellationToken;
