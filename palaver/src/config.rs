//! TOML configuration with environment overrides.
//!
//! Every field has a default, so an empty document is a valid configuration.
//!
//! ```rust
//! use palaver::config::{PalaverConfig, StorageKind};
//!
//! let config = PalaverConfig::from_toml_str(
//!     r#"
//!     [backend]
//!     default_model = "gpt-4"
//!
//!     [storage]
//!     kind = "in_memory"
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.backend.default_model, "gpt-4");
//! assert_eq!(config.backend.default_max_tokens, 1000);
//! assert_eq!(config.storage.kind, StorageKind::InMemory);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use pchat::{PartialReplyPolicy, RetryPolicy};
use pmemory::ConversationStoreConfig;
use pprovider::adapters::remote::{
    DEFAULT_BASE_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE, default_catalog,
};
use pprovider::{ModelDescriptor, ProviderId, SecretString};
use serde::Deserialize;

use crate::error::ConfigError;

pub const ENV_API_KEY: &str = "PALAVER_API_KEY";
pub const ENV_BASE_URL: &str = "PALAVER_BASE_URL";
pub const ENV_LOG: &str = "PALAVER_LOG";

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PalaverConfig {
    pub backend: BackendConfig,
    pub conversation: ConversationConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendConfig {
    pub provider_id: String,
    pub base_url: String,
    /// Inline key; prefer `api_key_env` outside local development.
    pub api_key: Option<String>,
    /// Name of an environment variable holding the key.
    pub api_key_env: Option<String>,
    pub timeout_secs: u64,
    pub default_model: String,
    pub default_max_tokens: u32,
    pub default_temperature: f32,
    /// Keep the built-in chat model catalog. Turn off for servers that only
    /// serve the models listed under `models`.
    pub builtin_models: bool,
    /// Extra models the backend serves; an entry replaces a built-in one with the same id.
    pub models: Vec<ModelEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelEntry {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default = "ModelEntry::default_context_window")]
    pub context_window: u32,
}

impl ModelEntry {
    fn default_context_window() -> u32 {
        8192
    }
}

impl BackendConfig {
    /// Model catalog for the remote backend, tagged with `provider`.
    pub fn catalog(&self, provider: &ProviderId) -> Vec<ModelDescriptor> {
        let mut catalog = if self.builtin_models {
            default_catalog(provider)
        } else {
            Vec::new()
        };

        for entry in &self.models {
            catalog.retain(|descriptor| !descriptor.matches(&entry.id));
            let mut descriptor =
                ModelDescriptor::new(entry.id.trim(), provider.clone(), entry.context_window);
            if let Some(display_name) = &entry.display_name {
                descriptor = descriptor.with_display_name(display_name.clone());
            }
            catalog.push(descriptor);
        }
        catalog
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider_id: "openai".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            api_key_env: None,
            timeout_secs: 60,
            default_model: DEFAULT_MODEL.to_string(),
            default_max_tokens: DEFAULT_MAX_TOKENS,
            default_temperature: DEFAULT_TEMPERATURE,
            builtin_models: true,
            models: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialReplySetting {
    #[default]
    Discard,
    PersistTruncated,
}

impl From<PartialReplySetting> for PartialReplyPolicy {
    fn from(setting: PartialReplySetting) -> Self {
        match setting {
            PartialReplySetting::Discard => Self::Discard,
            PartialReplySetting::PersistTruncated => Self::PersistTruncated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConversationConfig {
    pub partial_reply: PartialReplySetting,
    pub persist_retry_attempts: u32,
    pub persist_retry_initial_backoff_ms: u64,
    pub default_session_model: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            partial_reply: PartialReplySetting::Discard,
            persist_retry_attempts: 3,
            persist_retry_initial_backoff_ms: 200,
            default_session_model: pchat::DEFAULT_SESSION_MODEL.to_string(),
        }
    }
}

impl ConversationConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.persist_retry_attempts).with_initial_backoff(Duration::from_millis(
            self.persist_retry_initial_backoff_ms,
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    InMemory,
    #[default]
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub kind: StorageKind,
    /// SQLite file; the store's default location when unset.
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    pub fn store_config(&self) -> ConversationStoreConfig {
        match (self.kind, &self.path) {
            (StorageKind::InMemory, _) => ConversationStoreConfig::InMemory,
            (StorageKind::Sqlite, Some(path)) => ConversationStoreConfig::Sqlite { path: path.clone() },
            (StorageKind::Sqlite, None) => ConversationStoreConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive string.
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

impl PalaverConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)
            .map_err(|error| ConfigError::parse(format!("invalid configuration: {error}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path`, then applies process environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|error| {
            ConfigError::io(format!("failed to read '{}': {error}", path.display()))
        })?;
        let config = Self::from_toml_str(&source)?.with_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Applies `PALAVER_API_KEY`, `PALAVER_BASE_URL`, and `PALAVER_LOG` as
    /// resolved by `lookup`. Blank values are ignored.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(api_key) = non_blank(ENV_API_KEY) {
            self.backend.api_key = Some(api_key);
        }
        if let Some(base_url) = non_blank(ENV_BASE_URL) {
            self.backend.base_url = base_url;
        }
        if let Some(filter) = non_blank(ENV_LOG) {
            self.logging.filter = filter;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let backend = &self.backend;
        if backend.provider_id.trim().is_empty() {
            return Err(ConfigError::invalid("backend.provider_id must not be empty"));
        }
        if backend.base_url.trim().is_empty() {
            return Err(ConfigError::invalid("backend.base_url must not be empty"));
        }
        if backend.timeout_secs == 0 {
            return Err(ConfigError::invalid("backend.timeout_secs must be greater than zero"));
        }
        if backend.default_max_tokens == 0 {
            return Err(ConfigError::invalid(
                "backend.default_max_tokens must be greater than zero",
            ));
        }
        if !(0.0..=2.0).contains(&backend.default_temperature) {
            return Err(ConfigError::invalid(
                "backend.default_temperature must be in the inclusive range 0.0..=2.0",
            ));
        }
        if let Some(entry) = backend
            .models
            .iter()
            .find(|entry| entry.id.trim().is_empty() || entry.context_window == 0)
        {
            return Err(ConfigError::invalid(format!(
                "backend.models entry '{}' needs a non-empty id and a context_window above zero",
                entry.id
            )));
        }
        if !backend.builtin_models && backend.models.is_empty() {
            return Err(ConfigError::invalid(
                "backend.models must list at least one model when builtin_models is off",
            ));
        }
        if self.conversation.persist_retry_attempts == 0 {
            return Err(ConfigError::invalid(
                "conversation.persist_retry_attempts must be at least 1",
            ));
        }
        if self.conversation.default_session_model.trim().is_empty() {
            return Err(ConfigError::invalid(
                "conversation.default_session_model must not be empty",
            ));
        }
        Ok(())
    }

    /// The inline key, else the value of `api_key_env`. `None` means requests go unauthenticated.
    pub fn resolve_api_key(&self) -> Option<SecretString> {
        let inline = self
            .backend
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty());
        let from_env = || {
            self.backend
                .api_key_env
                .as_deref()
                .and_then(|name| std::env::var(name).ok())
                .filter(|key| !key.trim().is_empty())
        };

        inline.or_else(from_env).map(SecretString::new)
    }
}
