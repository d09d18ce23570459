//! Tenant-scoped completion routing over a [`GatewayRegistry`].
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use pprovider::{CompletionOrchestrator, GatewayRegistry, PlaceholderCredentials};
//!
//! let orchestrator = CompletionOrchestrator::new(
//!     Arc::new(GatewayRegistry::new()),
//!     Arc::new(PlaceholderCredentials),
//! );
//!
//! let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! let tokens = runtime.block_on(orchestrator.count_tokens(None, &"x".repeat(40), "gpt-4"));
//! assert_eq!(tokens, 10);
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use pcommon::TenantId;

use crate::{
    Completion, CompletionGateway, CompletionRequest, CredentialResolver, DeltaStream,
    GatewayRegistry, ModelDescriptor, ProviderError, estimate_tokens,
};

#[derive(Clone)]
pub struct CompletionOrchestrator {
    registry: Arc<GatewayRegistry>,
    credentials: Arc<dyn CredentialResolver>,
}

impl CompletionOrchestrator {
    pub fn new(registry: Arc<GatewayRegistry>, credentials: Arc<dyn CredentialResolver>) -> Self {
        Self {
            registry,
            credentials,
        }
    }

    pub fn registry(&self) -> &GatewayRegistry {
        &self.registry
    }

    /// Union of every gateway catalog in registration order, deduplicated by provider and id.
    pub fn list_models(&self, _tenant: Option<&TenantId>) -> Vec<ModelDescriptor> {
        let mut seen = HashSet::new();
        self.registry
            .gateways()
            .flat_map(|gateway| gateway.list_models())
            .filter(|descriptor| {
                seen.insert((descriptor.provider.clone(), descriptor.id.to_ascii_lowercase()))
            })
            .collect()
    }

    pub fn is_model_available(&self, tenant: Option<&TenantId>, model: &str) -> bool {
        if model.trim().is_empty() {
            return false;
        }

        self.registry
            .resolve(tenant, model)
            .map(|gateway| {
                gateway
                    .list_models()
                    .iter()
                    .any(|descriptor| descriptor.matches(model) && descriptor.available)
            })
            .unwrap_or(false)
    }

    pub async fn generate(
        &self,
        tenant: Option<&TenantId>,
        request: CompletionRequest,
    ) -> Result<Completion, ProviderError> {
        let gateway = self.route(tenant, &request.model)?;
        let credential = self.credentials.resolve(tenant, &gateway.provider_id())?;
        gateway.generate(&credential, request).await
    }

    /// Opens a delta stream on the resolved gateway.
    ///
    /// Routing and credential failures are returned here. The gateway and
    /// credential move into the returned stream so it outlives this call, which
    /// means a gateway's connection failure arrives as the first stream item.
    pub async fn generate_streaming(
        &self,
        tenant: Option<&TenantId>,
        request: CompletionRequest,
    ) -> Result<DeltaStream<'static>, ProviderError> {
        let gateway = self.route(tenant, &request.model)?;
        let credential = self.credentials.resolve(tenant, &gateway.provider_id())?;

        let stream = async_stream::try_stream! {
            let mut deltas = gateway.generate_streaming(&credential, request).await?;
            while let Some(delta) = futures_util::StreamExt::next(&mut deltas).await {
                yield delta?;
            }
        };

        Ok(Box::pin(stream))
    }

    /// Never fails: falls back to the character estimate when no gateway
    /// supports the model or the gateway reports an error.
    pub async fn count_tokens(&self, tenant: Option<&TenantId>, text: &str, model: &str) -> u32 {
        let Some(gateway) = self.registry.resolve(tenant, model) else {
            return estimate_tokens(text);
        };

        match gateway.count_tokens(text, model).await {
            Ok(count) => count,
            Err(error) => {
                tracing::debug!(
                    provider = %gateway.provider_id(),
                    error = %error,
                    "token counting failed; using estimate"
                );
                estimate_tokens(text)
            }
        }
    }

    fn route(
        &self,
        tenant: Option<&TenantId>,
        model: &str,
    ) -> Result<Arc<dyn CompletionGateway>, ProviderError> {
        if model.trim().is_empty() {
            return Err(ProviderError::invalid_request("model must not be empty"));
        }

        self.registry
            .resolve(tenant, model)
            .ok_or_else(|| ProviderError::model_not_supported(model))
    }
}
