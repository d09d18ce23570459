//! Remote text backend implementing [`CompletionGateway`] over a [`RemoteTransport`].

use std::sync::Arc;

use async_stream::try_stream;
use futures_util::StreamExt;

use crate::{
    Completion, CompletionGateway, CompletionRequest, Credential, DeltaStream, FrameOutcome,
    ModelDescriptor, ProviderError, ProviderFuture, ProviderId,
};

use super::frames::classify_frame;
use super::transport::RemoteTransport;
use super::wire::{RemoteMessage, RemoteRequest};

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Built-in chat model catalog.
pub fn default_catalog(provider: &ProviderId) -> Vec<ModelDescriptor> {
    let entries: [(&str, &str, &str, u32); 6] = [
        ("gpt-4", "GPT-4", "Most capable GPT-4 model", 8192),
        ("gpt-4-turbo", "GPT-4 Turbo", "GPT-4 Turbo with improved speed and cost", 128_000),
        ("gpt-4o", "GPT-4o", "GPT-4 Omni model", 128_000),
        ("gpt-4o-mini", "GPT-4o Mini", "Faster and cheaper GPT-4o", 128_000),
        ("gpt-3.5-turbo", "GPT-3.5 Turbo", "Fast and cost-effective model", 16_385),
        ("gpt-3.5-turbo-16k", "GPT-3.5 Turbo 16K", "GPT-3.5 with extended context", 16_385),
    ];

    entries
        .into_iter()
        .map(|(id, name, description, context_window)| {
            ModelDescriptor::new(id, provider.clone(), context_window)
                .with_display_name(name)
                .with_description(description)
        })
        .collect()
}

#[derive(Clone)]
pub struct RemoteTextBackend {
    provider_id: ProviderId,
    transport: Arc<dyn RemoteTransport>,
    catalog: Vec<ModelDescriptor>,
    default_model: String,
    default_max_tokens: u32,
    default_temperature: f32,
}

impl RemoteTextBackend {
    pub fn new(transport: Arc<dyn RemoteTransport>) -> Self {
        let provider_id = ProviderId::from("openai");
        Self {
            catalog: default_catalog(&provider_id),
            provider_id,
            transport,
            default_model: DEFAULT_MODEL.to_string(),
            default_max_tokens: DEFAULT_MAX_TOKENS,
            default_temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// Renames the gateway; catalog entries are re-tagged with the new id.
    pub fn with_provider_id(mut self, provider_id: ProviderId) -> Self {
        for descriptor in &mut self.catalog {
            descriptor.provider = provider_id.clone();
        }
        self.provider_id = provider_id;
        self
    }

    pub fn with_catalog(mut self, catalog: Vec<ModelDescriptor>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_default_max_tokens(mut self, max_tokens: u32) -> Self {
        self.default_max_tokens = max_tokens;
        self
    }

    pub fn with_default_temperature(mut self, temperature: f32) -> Self {
        self.default_temperature = temperature;
        self
    }

    pub(crate) fn build_remote_request(&self, request: CompletionRequest, stream: bool) -> RemoteRequest {
        let model = if request.model.trim().is_empty() {
            self.default_model.clone()
        } else {
            request.model
        };

        RemoteRequest {
            model,
            messages: request
                .messages
                .into_iter()
                .map(RemoteMessage::from)
                .collect(),
            max_tokens: request.options.max_tokens.unwrap_or(self.default_max_tokens),
            temperature: request
                .options
                .temperature
                .unwrap_or(self.default_temperature),
            stream,
        }
    }
}

impl CompletionGateway for RemoteTextBackend {
    fn provider_id(&self) -> ProviderId {
        self.provider_id.clone()
    }

    fn list_models(&self) -> Vec<ModelDescriptor> {
        self.catalog.clone()
    }

    fn generate<'a>(
        &'a self,
        credential: &'a Credential,
        request: CompletionRequest,
    ) -> ProviderFuture<'a, Result<Completion, ProviderError>> {
        Box::pin(async move {
            request.validate()?;
            let remote_request = self.build_remote_request(request, false);
            let requested_model = remote_request.model.clone();
            let response = self.transport.complete(remote_request, credential).await?;

            let choice = response.choices.into_iter().next().ok_or_else(|| {
                ProviderError::no_completion("No response generated from the backend")
            })?;

            Ok(Completion {
                message_id: uuid::Uuid::new_v4().to_string(),
                content: choice.message.content.unwrap_or_default(),
                model_used: response.model.unwrap_or(requested_model),
                token_count: response.usage.and_then(|usage| usage.total_tokens),
                created_at: chrono::Utc::now(),
            })
        })
    }

    fn generate_streaming<'a>(
        &'a self,
        credential: &'a Credential,
        request: CompletionRequest,
    ) -> ProviderFuture<'a, Result<DeltaStream<'a>, ProviderError>> {
        Box::pin(async move {
            request.validate()?;
            let remote_request = self.build_remote_request(request, true);
            let mut lines = self.transport.stream_lines(remote_request, credential).await?;

            let stream = try_stream! {
                while let Some(line) = lines.next().await {
                    match classify_frame(&line?) {
                        FrameOutcome::Delta(text) => yield text,
                        FrameOutcome::Skip => continue,
                        FrameOutcome::End => break,
                        FrameOutcome::Error(error) => Err::<(), _>(error)?,
                    }
                }
            };

            Ok(Box::pin(stream) as DeltaStream<'a>)
        })
    }
}
