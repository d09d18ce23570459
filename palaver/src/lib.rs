//! Unified facade over the palaver workspace crates.
//!
//! This crate is the single dependency for most hosts. It re-exports the core
//! crates and turns a [`config::PalaverConfig`] into a wired
//! [`runtime::Runtime`].
//!
//! ```rust
//! use palaver::prelude::*;
//!
//! let mut config = PalaverConfig::default();
//! config.storage.kind = StorageKind::InMemory;
//!
//! let runtime = build_runtime(&config).unwrap();
//! assert!(runtime.orchestrator.is_model_available(None, "gpt-4"));
//! ```

pub mod config;
pub mod error;
pub mod prelude;
pub mod runtime;
pub mod telemetry;

pub use pchat;
pub use pcommon;
pub use pmemory;
pub use pobserve;
pub use pprovider;

pub use config::{
    BackendConfig, ConversationConfig, LoggingConfig, ModelEntry, PalaverConfig, PartialReplySetting,
    StorageConfig, StorageKind,
};
pub use error::{ConfigError, ConfigErrorKind, RuntimeError, RuntimeErrorKind};
pub use pchat::{
    CancellationToken, ChannelDeltaSink, ChatError, ChatErrorKind, ConversationHooks,
    ConversationPolicy, ConversationService, ConversationServiceBuilder, ConversationSession,
    ConversationStore, DeltaSink, ExchangeMode, ExchangePhase, ExchangeResult, FnDeltaSink,
    InMemoryConversationStore, NewSession, PartialReplyPolicy, SendMessageRequest,
    SessionUpdate, Turn,
};
pub use pcommon::{BoxFuture, SessionId, TenantId, TurnId, UserId};
pub use pmemory::{ConversationStoreConfig, MemoryError, SqliteConversationStore};
pub use pprovider::{
    CompletionGateway, CompletionOrchestrator, CredentialResolver, GatewayRegistry,
    ModelDescriptor, ProviderError, ProviderErrorKind, ProviderId, Role, SecretString,
    TenantCredentialStore,
};
pub use runtime::{Runtime, build_orchestrator, build_runtime, build_runtime_with, default_hooks};
pub use telemetry::init_tracing;
