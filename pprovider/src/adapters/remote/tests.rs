//! Focused unit tests for remote adapter internals.

#![cfg(test)]

use std::sync::{Arc, Mutex};

use futures_util::{StreamExt, stream};

use crate::{
    CompletionGateway, CompletionRequest, Credential, FrameOutcome, Message, ProviderError,
    ProviderErrorKind, ProviderFuture, ProviderId, SecretString,
};

use super::backend::RemoteTextBackend;
use super::frames::{SseLineDecoder, classify_frame};
use super::transport::{RemoteLineStream, RemoteTransport};
use super::wire::{
    RemoteChoice, RemoteChoiceMessage, RemoteRequest, RemoteResponse, RemoteUsage,
    extract_error_message,
};

#[derive(Debug, Default)]
struct ScriptedTransport {
    response: Mutex<Option<RemoteResponse>>,
    lines: Vec<&'static str>,
    captured: Mutex<Vec<RemoteRequest>>,
}

impl RemoteTransport for ScriptedTransport {
    fn complete<'a>(
        &'a self,
        request: RemoteRequest,
        _credential: &'a Credential,
    ) -> ProviderFuture<'a, Result<RemoteResponse, ProviderError>> {
        Box::pin(async move {
            self.captured.lock().expect("captured lock").push(request);
            Ok(self
                .response
                .lock()
                .expect("response lock")
                .take()
                .unwrap_or_default())
        })
    }

    fn stream_lines<'a>(
        &'a self,
        request: RemoteRequest,
        _credential: &'a Credential,
    ) -> ProviderFuture<'a, Result<RemoteLineStream<'a>, ProviderError>> {
        Box::pin(async move {
            self.captured.lock().expect("captured lock").push(request);
            let lines = self
                .lines
                .iter()
                .map(|line| Ok(line.to_string()))
                .collect::<Vec<_>>();
            Ok(Box::pin(stream::iter(lines)) as RemoteLineStream<'a>)
        })
    }
}

fn backend(transport: Arc<ScriptedTransport>) -> RemoteTextBackend {
    RemoteTextBackend::new(transport)
}

#[test]
fn build_remote_request_applies_defaults() {
    let backend = backend(Arc::new(ScriptedTransport::default()));
    let request = CompletionRequest::new(" ", vec![Message::user("hi")]);

    let built = backend.build_remote_request(request, false);
    assert_eq!(built.model, "gpt-3.5-turbo");
    assert_eq!(built.max_tokens, 1000);
    assert_eq!(built.temperature, 0.7);
    assert!(!built.stream);
    assert_eq!(built.messages[0].role, "user");
}

#[test]
fn build_remote_request_keeps_explicit_options() {
    let backend = backend(Arc::new(ScriptedTransport::default()))
        .with_default_max_tokens(50);
    let request = CompletionRequest::new("gpt-4o", vec![Message::system("s"), Message::user("u")])
        .with_temperature(0.1)
        .with_max_tokens(12);

    let built = backend.build_remote_request(request, true);
    assert_eq!(built.model, "gpt-4o");
    assert_eq!(built.max_tokens, 12);
    assert_eq!(built.temperature, 0.1);
    assert!(built.stream);
    assert_eq!(built.messages.len(), 2);
}

#[test]
fn classify_frame_covers_every_outcome() {
    assert_eq!(classify_frame(": keep-alive"), FrameOutcome::Skip);
    assert_eq!(classify_frame(""), FrameOutcome::Skip);
    assert_eq!(classify_frame("data: [DONE]"), FrameOutcome::End);
    assert_eq!(classify_frame("data: {not json"), FrameOutcome::Skip);
    assert_eq!(
        classify_frame(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#),
        FrameOutcome::Skip
    );
    assert_eq!(
        classify_frame(r#"data: {"choices":[{"delta":{"content":""}}]}"#),
        FrameOutcome::Skip
    );
    assert_eq!(
        classify_frame(r#"data:{"choices":[{"delta":{"content":"hi"}}]}"#),
        FrameOutcome::Delta("hi".to_string())
    );

    match classify_frame(r#"data: {"error":{"message":"overloaded"}}"#) {
        FrameOutcome::Error(error) => {
            assert_eq!(error.kind, ProviderErrorKind::BackendUnavailable);
            assert_eq!(error.message, "overloaded");
        }
        other => panic!("expected error frame, got {other:?}"),
    }
}

#[test]
fn line_decoder_handles_split_utf8_and_crlf() {
    let text = "data: é\r\n";
    let bytes = text.as_bytes();
    let split = bytes
        .iter()
        .position(|byte| *byte >= 0x80)
        .expect("multibyte character")
        + 1;

    let mut decoder = SseLineDecoder::new();
    decoder.push(&bytes[..split]).expect("push");
    assert_eq!(decoder.next_line(), None);
    decoder.push(&bytes[split..]).expect("push");
    assert_eq!(decoder.next_line().as_deref(), Some("data: é"));
    assert_eq!(decoder.finish(), None);

    decoder.push(b"data: tail").expect("push");
    assert_eq!(decoder.finish().as_deref(), Some("data: tail"));
}

#[test]
fn line_decoder_rejects_unterminated_lines_past_the_limit() {
    let mut decoder = SseLineDecoder::with_max_line_bytes(16);

    decoder.push(b"data: short\n").expect("terminated line fits");
    assert_eq!(decoder.next_line().as_deref(), Some("data: short"));

    decoder.push(b"data: 0123").expect("still under the limit");
    let error = decoder
        .push(b"456789abcdef")
        .expect_err("line grew past the limit");
    assert_eq!(error.kind, ProviderErrorKind::BackendUnavailable);
    assert!(!error.retryable);
}

#[test]
fn line_decoder_limit_applies_per_line() {
    let mut decoder = SseLineDecoder::with_max_line_bytes(8);

    decoder
        .push(b"data: a\ndata: b\ndata: c\n")
        .expect("every line fits");
    let lines = std::iter::from_fn(|| decoder.next_line()).collect::<Vec<_>>();
    assert_eq!(lines, vec!["data: a", "data: b", "data: c"]);
}

#[test]
fn extract_error_message_reads_error_envelope() {
    assert_eq!(
        extract_error_message(r#"{"error":{"message":"bad key","type":"auth"}}"#).as_deref(),
        Some("bad key")
    );
    assert_eq!(extract_error_message("<html>"), None);
}

#[tokio::test]
async fn generate_maps_first_choice_and_usage() {
    let transport = Arc::new(ScriptedTransport {
        response: Mutex::new(Some(RemoteResponse {
            id: Some("chatcmpl-1".to_string()),
            model: Some("gpt-4o-2024".to_string()),
            choices: vec![RemoteChoice {
                message: RemoteChoiceMessage {
                    content: Some("Hello there".to_string()),
                },
            }],
            usage: Some(RemoteUsage {
                prompt_tokens: Some(3),
                completion_tokens: Some(2),
                total_tokens: Some(5),
            }),
        })),
        ..ScriptedTransport::default()
    });
    let backend = backend(Arc::clone(&transport));
    let credential = Credential::ApiKey(SecretString::new("sk-test"));

    let completion = backend
        .generate(
            &credential,
            CompletionRequest::new("gpt-4o", vec![Message::user("Hello")]),
        )
        .await
        .expect("generate should succeed");

    assert_eq!(completion.content, "Hello there");
    assert_eq!(completion.model_used, "gpt-4o-2024");
    assert_eq!(completion.token_count, Some(5));
    assert_eq!(completion.message_id.len(), 36);
    assert_eq!(transport.captured.lock().expect("captured lock").len(), 1);
}

#[tokio::test]
async fn generate_without_choices_is_no_completion() {
    let backend = backend(Arc::new(ScriptedTransport::default()));
    let error = backend
        .generate(
            &Credential::Placeholder,
            CompletionRequest::new("gpt-4", vec![Message::user("Hello")]),
        )
        .await
        .expect_err("empty choices should fail");

    assert_eq!(error.kind, ProviderErrorKind::NoCompletionProduced);
}

#[tokio::test]
async fn streaming_yields_deltas_skips_noise_and_stops_at_done() {
    let transport = Arc::new(ScriptedTransport {
        lines: vec![
            r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#,
            "",
            r#"data: {"choices":[{"delta":{"content":"He"}}]}"#,
            "data: {garbage",
            r#"data: {"choices":[{"delta":{"content":"llo"}}]}"#,
            "data: [DONE]",
            r#"data: {"choices":[{"delta":{"content":"ignored"}}]}"#,
        ],
        ..ScriptedTransport::default()
    });
    let backend = backend(Arc::clone(&transport));
    let credential = Credential::Placeholder;

    let mut stream = backend
        .generate_streaming(
            &credential,
            CompletionRequest::new("gpt-4", vec![Message::user("Hello")]),
        )
        .await
        .expect("stream should open");

    let mut deltas = Vec::new();
    while let Some(delta) = stream.next().await {
        deltas.push(delta.expect("delta should be ok"));
    }

    assert_eq!(deltas, vec!["He".to_string(), "llo".to_string()]);
    assert!(transport.captured.lock().expect("captured lock")[0].stream);
}

#[tokio::test]
async fn streaming_error_frame_terminates_with_error() {
    let transport = Arc::new(ScriptedTransport {
        lines: vec![
            r#"data: {"choices":[{"delta":{"content":"partial"}}]}"#,
            r#"data: {"error":{"message":"server fault"}}"#,
        ],
        ..ScriptedTransport::default()
    });
    let backend = backend(transport);
    let credential = Credential::Placeholder;

    let mut stream = backend
        .generate_streaming(
            &credential,
            CompletionRequest::new("gpt-4", vec![Message::user("Hello")]),
        )
        .await
        .expect("stream should open");

    assert_eq!(
        stream.next().await.expect("first item").expect("delta"),
        "partial"
    );
    let error = stream
        .next()
        .await
        .expect("second item")
        .expect_err("error frame should surface");
    assert_eq!(error.kind, ProviderErrorKind::BackendUnavailable);
    assert!(stream.next().await.is_none());
}

#[test]
fn catalog_is_case_insensitive_and_retagged() {
    let backend = backend(Arc::new(ScriptedTransport::default()))
        .with_provider_id(ProviderId::from("remote"));

    assert!(backend.supports_model("GPT-4O-MINI"));
    assert!(!backend.supports_model("claude-3"));
    assert_eq!(backend.list_models().len(), 6);
    assert!(
        backend
            .list_models()
            .iter()
            .all(|model| model.provider.as_str() == "remote" && model.supports_streaming)
    );
}
