//! Remote transport trait and reqwest-based HTTP implementation.

use std::pin::Pin;
use std::time::Duration;

use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder, Response};

use crate::{Credential, ProviderError, ProviderFuture};

use super::frames::SseLineDecoder;
use super::wire::{RemoteRequest, RemoteResponse, extract_error_message};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Raw SSE lines of one streaming response, in arrival order.
pub type RemoteLineStream<'a> =
    Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send + 'a>>;

pub trait RemoteTransport: Send + Sync + std::fmt::Debug {
    fn complete<'a>(
        &'a self,
        request: RemoteRequest,
        credential: &'a Credential,
    ) -> ProviderFuture<'a, Result<RemoteResponse, ProviderError>>;

    /// Sends a streaming request. A non-success status fails here, before any line.
    fn stream_lines<'a>(
        &'a self,
        request: RemoteRequest,
        credential: &'a Credential,
    ) -> ProviderFuture<'a, Result<RemoteLineStream<'a>, ProviderError>>;
}

/// Transport over a shared `reqwest::Client`; the client's pool is reused by every call.
#[derive(Debug, Clone)]
pub struct HttpRemoteTransport {
    client: Client,
    base_url: String,
}

impl HttpRemoteTransport {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Builds a client with the given request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ProviderError::other(format!("failed to build http client: {err}")))?;
        Ok(Self::new(client))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn apply_auth(&self, builder: RequestBuilder, credential: &Credential) -> RequestBuilder {
        match credential {
            Credential::ApiKey(key) => builder.bearer_auth(key.expose()),
            Credential::Placeholder => builder,
        }
    }

    async fn send(
        &self,
        request: &RemoteRequest,
        credential: &Credential,
    ) -> Result<Response, ProviderError> {
        let builder = self
            .client
            .post(self.endpoint("chat/completions"))
            .json(request);
        let response = self
            .apply_auth(builder, credential)
            .send()
            .await
            .map_err(|err| ProviderError::unavailable(err.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::parse_error(response).await);
        }

        Ok(response)
    }

    async fn parse_error(response: Response) -> ProviderError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = extract_error_message(&body)
            .unwrap_or_else(|| format!("backend request failed with status {status}"));

        ProviderError::from_status(status.as_u16(), message)
    }
}

impl RemoteTransport for HttpRemoteTransport {
    fn complete<'a>(
        &'a self,
        request: RemoteRequest,
        credential: &'a Credential,
    ) -> ProviderFuture<'a, Result<RemoteResponse, ProviderError>> {
        Box::pin(async move {
            let response = self.send(&request, credential).await?;
            response
                .json::<RemoteResponse>()
                .await
                .map_err(|err| ProviderError::unavailable(format!("invalid response body: {err}")))
        })
    }

    fn stream_lines<'a>(
        &'a self,
        mut request: RemoteRequest,
        credential: &'a Credential,
    ) -> ProviderFuture<'a, Result<RemoteLineStream<'a>, ProviderError>> {
        Box::pin(async move {
            request.stream = true;
            let response = self.send(&request, credential).await?;

            let stream = try_stream! {
                let mut chunks = response.bytes_stream();
                let mut decoder = SseLineDecoder::new();

                while let Some(item) = chunks.next().await {
                    let bytes = item.map_err(|err| ProviderError::unavailable(err.to_string()))?;
                    decoder.push(&bytes)?;

                    while let Some(line) = decoder.next_line() {
                        yield line;
                    }
                }

                if let Some(line) = decoder.finish() {
                    yield line;
                }
            };

            Ok(Box::pin(stream) as RemoteLineStream<'a>)
        })
    }
}
