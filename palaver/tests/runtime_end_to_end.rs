use std::sync::Arc;

use palaver::prelude::*;
use palaver::{InMemoryConversationStore, build_runtime_with, default_hooks};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> PalaverConfig {
    let mut config = PalaverConfig::default();
    config.backend.base_url = server.uri();
    config.backend.api_key = Some("sk-e2e".to_string());
    config.storage.kind = StorageKind::InMemory;
    config.conversation.persist_retry_initial_backoff_ms = 0;
    config
}

fn runtime_for(server: &MockServer) -> Runtime {
    build_runtime_with(
        &config_for(server),
        Arc::new(InMemoryConversationStore::new()),
        default_hooks(),
    )
    .expect("runtime should build")
}

async fn session_for(runtime: &Runtime, owner: &UserId) -> ConversationSession {
    runtime
        .service
        .start_session(
            NewSession::new(owner.clone(), TenantId::from("acme"), "Support")
                .with_model("gpt-4")
                .with_system_directive("You are helpful."),
        )
        .await
        .expect("session should start")
}

#[tokio::test]
async fn one_shot_exchange_reaches_backend_and_persists_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-e2e"))
        .and(body_partial_json(serde_json::json!({
            "model": "gpt-4",
            "stream": false,
            "messages": [
                {"role": "system", "content": "You are helpful."},
                {"role": "user", "content": "Where is my order?"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "chatcmpl-9",
            "model": "gpt-4",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "It shipped today."}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 4, "total_tokens": 16}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let runtime = runtime_for(&server);
    let owner = UserId::from("customer-1");
    let session = session_for(&runtime, &owner).await;

    let result = runtime
        .service
        .send_message(
            SendMessageRequest::new(session.id.clone(), owner.clone(), "Where is my order?"),
            &CancellationToken::new(),
        )
        .await
        .expect("exchange should succeed");

    assert_eq!(result.assistant_turn.content, "It shipped today.");
    assert_eq!(result.assistant_turn.model.as_deref(), Some("gpt-4"));

    let turns = runtime
        .service
        .list_turns(&session.id, &owner)
        .await
        .expect("turns");
    assert_eq!(turns.len(), 2);
}

#[tokio::test]
async fn streamed_exchange_forwards_sse_deltas() {
    let server = MockServer::start().await;
    let body = [
        r#"{"choices":[{"delta":{"content":"It "}}]}"#,
        r#"{"choices":[{"delta":{"content":"shipped."}}]}"#,
        "[DONE]",
    ]
    .iter()
    .map(|frame| format!("data: {frame}\n\n"))
    .collect::<String>();

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_raw(body.into_bytes(), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let runtime = runtime_for(&server);
    let owner = UserId::from("customer-2");
    let session = session_for(&runtime, &owner).await;

    let (mut sink, mut receiver) = ChannelDeltaSink::channel(8);
    let result = runtime
        .service
        .send_message_streaming(
            SendMessageRequest::new(session.id.clone(), owner, "Status?"),
            &mut sink,
            &CancellationToken::new(),
        )
        .await
        .expect("streamed exchange should succeed");
    drop(sink);

    let mut forwarded = Vec::new();
    while let Some(delta) = receiver.recv().await {
        forwarded.push(delta);
    }
    assert_eq!(forwarded, vec!["It ", "shipped."]);
    assert_eq!(result.assistant_turn.content, "It shipped.");
}

#[tokio::test]
async fn backend_outage_keeps_the_user_turn() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
            "error": {"message": "overloaded"}
        })))
        .mount(&server)
        .await;

    let runtime = runtime_for(&server);
    let owner = UserId::from("customer-3");
    let session = session_for(&runtime, &owner).await;

    let error = runtime
        .service
        .send_message(
            SendMessageRequest::new(session.id.clone(), owner.clone(), "Hello?"),
            &CancellationToken::new(),
        )
        .await
        .expect_err("backend is down");
    assert_eq!(error.kind, ChatErrorKind::BackendUnavailable);
    assert!(error.retryable);

    let turns = runtime
        .service
        .list_turns(&session.id, &owner)
        .await
        .expect("turns");
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].content, "Hello?");
}

#[tokio::test]
async fn streamed_exchange_rejected_by_backend_forwards_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({"stream": true})))
        .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
            "error": {"message": "overloaded"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let runtime = runtime_for(&server);
    let owner = UserId::from("customer-4");
    let session = session_for(&runtime, &owner).await;

    let mut sink: Vec<String> = Vec::new();
    let error = runtime
        .service
        .send_message_streaming(
            SendMessageRequest::new(session.id.clone(), owner.clone(), "Anyone there?"),
            &mut sink,
            &CancellationToken::new(),
        )
        .await
        .expect_err("backend is down");

    assert_eq!(error.kind, ChatErrorKind::BackendUnavailable);
    assert!(error.retryable);
    assert!(sink.is_empty());

    let turns = runtime
        .service
        .list_turns(&session.id, &owner)
        .await
        .expect("turns");
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].content, "Anyone there?");
}
