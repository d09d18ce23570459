//! Secret handling and per-tenant credential resolution.
//!
//! ```rust
//! use pprovider::{Credential, CredentialResolver, ProviderId, TenantCredentialStore};
//! use pcommon::TenantId;
//!
//! let store = TenantCredentialStore::new();
//! store
//!     .set_api_key(TenantId::from("acme"), ProviderId::from("remote"), "sk-acme")
//!     .expect("key should store");
//!
//! let credential = store
//!     .resolve(Some(&TenantId::from("acme")), &ProviderId::from("remote"))
//!     .expect("credential should resolve");
//! assert!(matches!(credential, Credential::ApiKey(_)));
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use pcommon::TenantId;

use crate::{ProviderError, ProviderId};

#[derive(Clone, PartialEq, Eq)]
pub struct SecretString {
    value: String,
}

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn expose(&self) -> &str {
        self.value.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.value.trim().is_empty()
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Drop for SecretString {
    fn drop(&mut self) {
        // SAFETY: zero bytes are valid UTF-8 and the string is never read again.
        unsafe {
            self.value.as_mut_vec().fill(0);
        }
    }
}

/// Credential handed to a gateway for one call.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    ApiKey(SecretString),
    /// Explicitly no credential; gateways send no auth header.
    Placeholder,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey(_) => f.write_str("Credential::ApiKey([REDACTED])"),
            Self::Placeholder => f.write_str("Credential::Placeholder"),
        }
    }
}

pub trait CredentialResolver: Send + Sync {
    fn resolve(
        &self,
        tenant: Option<&TenantId>,
        provider: &ProviderId,
    ) -> Result<Credential, ProviderError>;
}

/// Resolver that always yields [`Credential::Placeholder`].
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderCredentials;

impl CredentialResolver for PlaceholderCredentials {
    fn resolve(
        &self,
        _tenant: Option<&TenantId>,
        _provider: &ProviderId,
    ) -> Result<Credential, ProviderError> {
        Ok(Credential::Placeholder)
    }
}

type TenantKey = (TenantId, ProviderId);

/// In-memory per-tenant, per-provider API keys with an optional default key.
#[derive(Default)]
pub struct TenantCredentialStore {
    keys: Mutex<HashMap<TenantKey, SecretString>>,
    default_key: Option<SecretString>,
}

impl TenantCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key used when no tenant-specific key exists.
    pub fn with_default_key(mut self, api_key: impl Into<String>) -> Self {
        let api_key = SecretString::new(api_key);
        self.default_key = (!api_key.is_empty()).then_some(api_key);
        self
    }

    pub fn set_api_key(
        &self,
        tenant: TenantId,
        provider: ProviderId,
        api_key: impl Into<String>,
    ) -> Result<(), ProviderError> {
        let api_key = SecretString::new(api_key);
        if api_key.is_empty() {
            return Err(ProviderError::authentication("api key must not be empty"));
        }

        self.keys_mut()?.insert((tenant, provider), api_key);
        Ok(())
    }

    pub fn clear(&self, tenant: &TenantId, provider: &ProviderId) -> Result<bool, ProviderError> {
        Ok(self
            .keys_mut()?
            .remove(&(tenant.clone(), provider.clone()))
            .is_some())
    }

    fn keys_mut(&self) -> Result<MutexGuard<'_, HashMap<TenantKey, SecretString>>, ProviderError> {
        self.keys
            .lock()
            .map_err(|_| ProviderError::other("credential store lock poisoned"))
    }
}

impl CredentialResolver for TenantCredentialStore {
    fn resolve(
        &self,
        tenant: Option<&TenantId>,
        provider: &ProviderId,
    ) -> Result<Credential, ProviderError> {
        if let Some(tenant) = tenant {
            let keys = self.keys_mut()?;
            if let Some(key) = keys.get(&(tenant.clone(), provider.clone())) {
                return Ok(Credential::ApiKey(key.clone()));
            }
        }

        match &self.default_key {
            Some(key) => Ok(Credential::ApiKey(key.clone())),
            None => Err(ProviderError::authentication(format!(
                "no api key configured for provider '{provider}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProviderErrorKind;

    #[test]
    fn secret_debug_is_redacted() {
        let credential = Credential::ApiKey(SecretString::new("sk-secret"));
        assert_eq!(format!("{credential:?}"), "Credential::ApiKey([REDACTED])");
        assert_eq!(format!("{:?}", SecretString::new("x")), "[REDACTED]");
    }

    #[test]
    fn tenant_key_wins_over_default_key() {
        let store = TenantCredentialStore::new().with_default_key("sk-default");
        let provider = ProviderId::from("remote");
        store
            .set_api_key(TenantId::from("acme"), provider.clone(), "sk-acme")
            .expect("key should store");

        let acme = store
            .resolve(Some(&TenantId::from("acme")), &provider)
            .expect("acme should resolve");
        let other = store
            .resolve(Some(&TenantId::from("globex")), &provider)
            .expect("default should resolve");

        assert_eq!(acme, Credential::ApiKey(SecretString::new("sk-acme")));
        assert_eq!(other, Credential::ApiKey(SecretString::new("sk-default")));
    }

    #[test]
    fn missing_key_without_default_is_authentication_error() {
        let store = TenantCredentialStore::new();
        let error = store
            .resolve(None, &ProviderId::from("remote"))
            .expect_err("resolution should fail");
        assert_eq!(error.kind, ProviderErrorKind::Authentication);

        let blank = store.set_api_key(TenantId::from("a"), ProviderId::from("remote"), "  ");
        assert!(blank.is_err());
    }

    #[test]
    fn clear_removes_tenant_key() {
        let store = TenantCredentialStore::new();
        let tenant = TenantId::from("acme");
        let provider = ProviderId::from("remote");
        store
            .set_api_key(tenant.clone(), provider.clone(), "sk-1")
            .expect("key should store");

        assert!(store.clear(&tenant, &provider).expect("clear should work"));
        assert!(store.resolve(Some(&tenant), &provider).is_err());
    }

    #[test]
    fn placeholder_resolver_never_fails() {
        let credential = PlaceholderCredentials
            .resolve(None, &ProviderId::from("anything"))
            .expect("placeholder should resolve");
        assert_eq!(credential, Credential::Placeholder);
    }
}
