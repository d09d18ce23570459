//! Common imports for most palaver hosts.

pub use crate::{
    CancellationToken, ChannelDeltaSink, ChatError, ChatErrorKind, ConversationService,
    ConversationSession, DeltaSink, ExchangeResult, FnDeltaSink, NewSession, PalaverConfig,
    PartialReplyPolicy, Runtime, SendMessageRequest, SessionId, SessionUpdate, StorageKind,
    TenantId, Turn, UserId, build_runtime, init_tracing,
};
