//! Gateway registry with explicit model/tenant bindings and a pluggable
//! selection strategy for unbound models.
//!
//! Resolution order for a `(tenant, model)` pair:
//! 1. a `(tenant, model)` binding,
//! 2. a `model` binding,
//! 3. the [`SelectionStrategy`] over registered gateways that support the model.
//!
//! Bindings are matched case-insensitively. A binding to a provider that is
//! not registered resolves to nothing rather than falling through.
//!
//! ```rust
//! use pprovider::{GatewayRegistry, ProviderId};
//!
//! let mut registry = GatewayRegistry::new();
//! registry.bind_model("gpt-4o", ProviderId::from("remote"));
//! assert!(registry.is_empty());
//! assert!(registry.resolve(None, "gpt-4o").is_none());
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use pcommon::{Registry, TenantId};

use crate::{CompletionGateway, ProviderId};

/// Chooses a gateway for a model with no explicit binding.
pub trait SelectionStrategy: Send + Sync {
    /// `candidates` holds only gateways that support `model`, in registration order.
    fn select(
        &self,
        tenant: Option<&TenantId>,
        model: &str,
        candidates: &[Arc<dyn CompletionGateway>],
    ) -> Option<Arc<dyn CompletionGateway>>;
}

/// Picks the first registered gateway supporting the model.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstRegistered;

impl SelectionStrategy for FirstRegistered {
    fn select(
        &self,
        _tenant: Option<&TenantId>,
        _model: &str,
        candidates: &[Arc<dyn CompletionGateway>],
    ) -> Option<Arc<dyn CompletionGateway>> {
        candidates.first().cloned()
    }
}

pub struct GatewayRegistry {
    gateways: Registry<ProviderId, Arc<dyn CompletionGateway>>,
    model_bindings: HashMap<String, ProviderId>,
    tenant_bindings: HashMap<(TenantId, String), ProviderId>,
    strategy: Box<dyn SelectionStrategy>,
}

impl Default for GatewayRegistry {
    fn default() -> Self {
        Self {
            gateways: Registry::new(),
            model_bindings: HashMap::new(),
            tenant_bindings: HashMap::new(),
            strategy: Box::new(FirstRegistered),
        }
    }
}

fn binding_key(model: &str) -> String {
    model.trim().to_ascii_lowercase()
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy<S>(mut self, strategy: S) -> Self
    where
        S: SelectionStrategy + 'static,
    {
        self.strategy = Box::new(strategy);
        self
    }

    /// Registers a gateway. Re-registering an id replaces it in place.
    pub fn register<G>(&mut self, gateway: G)
    where
        G: CompletionGateway + 'static,
    {
        self.register_shared(Arc::new(gateway));
    }

    pub fn register_shared(&mut self, gateway: Arc<dyn CompletionGateway>) {
        self.gateways.insert(gateway.provider_id(), gateway);
    }

    pub fn bind_model(&mut self, model: &str, provider: ProviderId) {
        self.model_bindings.insert(binding_key(model), provider);
    }

    pub fn bind_tenant_model(&mut self, tenant: TenantId, model: &str, provider: ProviderId) {
        self.tenant_bindings
            .insert((tenant, binding_key(model)), provider);
    }

    pub fn get(&self, provider: &ProviderId) -> Option<Arc<dyn CompletionGateway>> {
        self.gateways.get(provider).cloned()
    }

    pub fn contains(&self, provider: &ProviderId) -> bool {
        self.gateways.contains_key(provider)
    }

    /// All gateways in registration order.
    pub fn gateways(&self) -> impl Iterator<Item = &Arc<dyn CompletionGateway>> {
        self.gateways.values()
    }

    pub fn len(&self) -> usize {
        self.gateways.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gateways.is_empty()
    }

    pub fn resolve(
        &self,
        tenant: Option<&TenantId>,
        model: &str,
    ) -> Option<Arc<dyn CompletionGateway>> {
        let key = binding_key(model);

        if let Some(tenant) = tenant
            && let Some(provider) = self.tenant_bindings.get(&(tenant.clone(), key.clone()))
        {
            return self.get(provider);
        }

        if let Some(provider) = self.model_bindings.get(&key) {
            return self.get(provider);
        }

        let candidates = self
            .gateways
            .values()
            .filter(|gateway| gateway.supports_model(model))
            .cloned()
            .collect::<Vec<_>>();

        self.strategy.select(tenant, model, &candidates)
    }
}
