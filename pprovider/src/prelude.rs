//! Common `pprovider` imports for downstream crates.

pub use crate::{
    Completion, CompletionGateway, CompletionOrchestrator, CompletionRequest, Credential,
    CredentialResolver, DeltaStream, FirstRegistered, GatewayRegistry, Message, ModelDescriptor,
    PlaceholderCredentials, ProviderError, ProviderErrorKind, ProviderFuture, ProviderId, Role,
    SelectionStrategy, TenantCredentialStore, estimate_tokens,
};
pub use pcommon::BoxFuture;
