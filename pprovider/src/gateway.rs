//! The completion gateway capability contract.

use std::future::Future;
use std::pin::Pin;

use crate::{
    Completion, CompletionRequest, Credential, DeltaStream, ModelDescriptor, ProviderError,
    ProviderId,
};

pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Approximates a token count as one token per four characters, rounded up.
///
/// ```rust
/// use pprovider::estimate_tokens;
///
/// assert_eq!(estimate_tokens(""), 0);
/// assert_eq!(estimate_tokens("abcde"), 2);
/// assert_eq!(estimate_tokens(&"x".repeat(40)), 10);
/// ```
pub fn estimate_tokens(text: &str) -> u32 {
    let chars = text.chars().count() as u64;
    chars.div_ceil(4).min(u64::from(u32::MAX)) as u32
}

pub trait CompletionGateway: Send + Sync {
    fn provider_id(&self) -> ProviderId;

    fn list_models(&self) -> Vec<ModelDescriptor>;

    fn generate<'a>(
        &'a self,
        credential: &'a Credential,
        request: CompletionRequest,
    ) -> ProviderFuture<'a, Result<Completion, ProviderError>>;

    /// Opens a lazy delta stream. Status failures surface here, before any delta.
    fn generate_streaming<'a>(
        &'a self,
        credential: &'a Credential,
        request: CompletionRequest,
    ) -> ProviderFuture<'a, Result<DeltaStream<'a>, ProviderError>>;

    fn count_tokens<'a>(
        &'a self,
        text: &'a str,
        _model: &'a str,
    ) -> ProviderFuture<'a, Result<u32, ProviderError>> {
        Box::pin(async move { Ok(estimate_tokens(text)) })
    }

    fn supports_model(&self, model: &str) -> bool {
        self.list_models()
            .iter()
            .any(|descriptor| descriptor.matches(model))
    }
}
