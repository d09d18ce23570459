//! Runtime wiring from configuration to a ready conversation service.

use std::sync::Arc;
use std::time::Duration;

use pchat::{ConversationHooks, ConversationService, ConversationStore};
use pmemory::create_conversation_store;
use pobserve::{
    FanoutConversationHooks, MetricsConversationHooks, SafeConversationHooks,
    TracingConversationHooks,
};
use pprovider::{
    CompletionOrchestrator, CredentialResolver, GatewayRegistry, HttpRemoteTransport,
    PlaceholderCredentials, ProviderId, RemoteTextBackend, TenantCredentialStore,
};

use crate::config::PalaverConfig;
use crate::error::{ConfigError, RuntimeError};

#[derive(Clone)]
pub struct Runtime {
    pub service: ConversationService,
    pub orchestrator: CompletionOrchestrator,
    pub store: Arc<dyn ConversationStore>,
}

/// Panic-isolated tracing plus metrics hooks.
pub fn default_hooks() -> Arc<dyn ConversationHooks> {
    Arc::new(
        FanoutConversationHooks::new()
            .with(Arc::new(SafeConversationHooks::new(TracingConversationHooks)))
            .with(Arc::new(SafeConversationHooks::new(MetricsConversationHooks))),
    )
}

pub fn build_runtime(config: &PalaverConfig) -> Result<Runtime, RuntimeError> {
    config.validate()?;
    let store = create_conversation_store(config.storage.store_config())?;
    build_runtime_with(config, store, default_hooks())
}

pub fn build_runtime_with(
    config: &PalaverConfig,
    store: Arc<dyn ConversationStore>,
    hooks: Arc<dyn ConversationHooks>,
) -> Result<Runtime, RuntimeError> {
    config.validate()?;
    let orchestrator = build_orchestrator(config)?;
    ensure_routable(
        &orchestrator,
        "conversation.default_session_model",
        &config.conversation.default_session_model,
    )?;
    ensure_routable(&orchestrator, "backend.default_model", &config.backend.default_model)?;

    let service = ConversationService::builder(orchestrator.clone(), Arc::clone(&store))
        .hooks(hooks)
        .partial_reply(config.conversation.partial_reply.into())
        .persist_retry(config.conversation.retry_policy())
        .default_session_model(config.conversation.default_session_model.clone())
        .build();

    tracing::info!(
        provider = %config.backend.provider_id,
        base_url = %config.backend.base_url,
        storage = ?config.storage.kind,
        "palaver runtime ready"
    );

    Ok(Runtime {
        service,
        orchestrator,
        store,
    })
}

pub fn build_orchestrator(config: &PalaverConfig) -> Result<CompletionOrchestrator, RuntimeError> {
    let backend_config = &config.backend;
    let provider_id = ProviderId::new(backend_config.provider_id.clone());

    let transport = HttpRemoteTransport::with_timeout(Duration::from_secs(
        backend_config.timeout_secs,
    ))?
    .with_base_url(backend_config.base_url.clone());
    let backend = RemoteTextBackend::new(Arc::new(transport))
        .with_catalog(backend_config.catalog(&provider_id))
        .with_provider_id(provider_id)
        .with_default_model(backend_config.default_model.clone())
        .with_default_max_tokens(backend_config.default_max_tokens)
        .with_default_temperature(backend_config.default_temperature);

    let mut registry = GatewayRegistry::new();
    registry.register(backend);

    let credentials: Arc<dyn CredentialResolver> = match config.resolve_api_key() {
        Some(api_key) => Arc::new(TenantCredentialStore::new().with_default_key(api_key.expose())),
        None => Arc::new(PlaceholderCredentials),
    };

    Ok(CompletionOrchestrator::new(Arc::new(registry), credentials))
}

/// Rejects a configured model no registered gateway would route.
fn ensure_routable(
    orchestrator: &CompletionOrchestrator,
    setting: &str,
    model: &str,
) -> Result<(), RuntimeError> {
    if orchestrator.is_model_available(None, model) {
        return Ok(());
    }
    Err(ConfigError::invalid(format!(
        "{setting} '{model}' is not in the backend model catalog; list it under [[backend.models]]"
    ))
    .into())
}

#[cfg(test)]
mod tests {
    use pchat::NoopConversationHooks;
    use pchat::InMemoryConversationStore;

    use super::*;
    use crate::config::StorageKind;

    fn in_memory_config() -> PalaverConfig {
        let mut config = PalaverConfig::default();
        config.storage.kind = StorageKind::InMemory;
        config
    }

    #[test]
    fn orchestrator_exposes_the_remote_catalog() {
        let orchestrator = build_orchestrator(&in_memory_config()).expect("orchestrator");

        assert!(orchestrator.is_model_available(None, "gpt-4"));
        assert!(orchestrator.is_model_available(None, "GPT-3.5-Turbo"));
        assert!(!orchestrator.is_model_available(None, "unknown-model"));
        assert_eq!(orchestrator.list_models(None).len(), 6);
    }

    #[test]
    fn runtime_applies_conversation_settings() {
        let mut config = in_memory_config();
        config.conversation.default_session_model = "gpt-4".to_string();
        config.conversation.persist_retry_attempts = 7;

        let runtime = build_runtime_with(
            &config,
            Arc::new(InMemoryConversationStore::new()),
            Arc::new(NoopConversationHooks),
        )
        .expect("runtime");

        assert_eq!(runtime.service.policy().default_session_model, "gpt-4");
        assert_eq!(runtime.service.policy().persist_retry.max_attempts, 7);
    }

    #[test]
    fn default_models_must_be_in_the_catalog() {
        let mut config = in_memory_config();
        config.backend.default_model = "llama3".to_string();
        config.conversation.default_session_model = "llama3".to_string();

        let error = build_runtime(&config).err().expect("llama3 is not routable");
        assert_eq!(error.kind, crate::error::RuntimeErrorKind::Config);
        assert!(error.message.contains("conversation.default_session_model"));

        config.backend.models.push(crate::config::ModelEntry {
            id: "llama3".to_string(),
            display_name: None,
            context_window: 8192,
        });
        let runtime = build_runtime(&config).expect("listed model routes");
        assert!(runtime.orchestrator.is_model_available(None, "llama3"));
    }

    #[test]
    fn invalid_configuration_is_reported_before_wiring() {
        let mut config = in_memory_config();
        config.backend.timeout_secs = 0;

        let error = build_runtime(&config).err().expect("invalid config");
        assert_eq!(error.kind, crate::error::RuntimeErrorKind::Config);
    }
}
