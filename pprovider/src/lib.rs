//! Completion gateway contracts, routing, and the remote text backend.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use pprovider::{
//!     CompletionOrchestrator, CompletionRequest, GatewayRegistry, Message,
//!     PlaceholderCredentials, ProviderErrorKind,
//! };
//!
//! let orchestrator = CompletionOrchestrator::new(
//!     Arc::new(GatewayRegistry::new()),
//!     Arc::new(PlaceholderCredentials),
//! );
//!
//! let request = CompletionRequest::new("gpt-4", vec![Message::user("hi")]);
//! let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! let error = runtime
//!     .block_on(orchestrator.generate(None, request))
//!     .expect_err("no gateway is registered");
//! assert_eq!(error.kind, ProviderErrorKind::ModelNotSupported);
//! ```

pub mod adapters;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod model;
pub mod orchestrator;
pub mod prelude;
pub mod registry;
pub mod stream;

pub use credentials::{
    Credential, CredentialResolver, PlaceholderCredentials, SecretString, TenantCredentialStore,
};
pub use error::{ProviderError, ProviderErrorKind};
pub use gateway::{CompletionGateway, ProviderFuture, estimate_tokens};
pub use model::{
    Completion, CompletionRequest, Message, ModelDescriptor, ProviderId,
    Role,
};
pub use orchestrator::CompletionOrchestrator;
pub use registry::{FirstRegistered, GatewayRegistry, SelectionStrategy};
pub use stream::{DeltaStream, FrameOutcome, VecDeltaStream};

#[cfg(feature = "provider-remote")]
pub use adapters::remote::{HttpRemoteTransport, RemoteTextBackend, RemoteTransport};
