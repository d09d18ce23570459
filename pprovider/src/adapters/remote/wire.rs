//! Chat-completions HTTP payload serde models.

use serde::{Deserialize, Serialize};

use crate::Message;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteRequest {
    pub model: String,
    pub messages: Vec<RemoteMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMessage {
    pub role: String,
    pub content: String,
}

impl From<Message> for RemoteMessage {
    fn from(value: Message) -> Self {
        Self {
            role: value.role.as_str().to_string(),
            content: value.content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct RemoteResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<RemoteChoice>,
    #[serde(default)]
    pub usage: Option<RemoteUsage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteChoice {
    pub message: RemoteChoiceMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct RemoteChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct RemoteUsage {
    #[serde(default)]
    pub prompt_tokens: Option<u32>,
    #[serde(default)]
    pub completion_tokens: Option<u32>,
    #[serde(default)]
    pub total_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RemoteStreamChunk {
    #[serde(default)]
    pub choices: Vec<RemoteStreamChoice>,
    #[serde(default)]
    pub error: Option<RemoteErrorBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RemoteStreamChoice {
    #[serde(default)]
    pub delta: RemoteStreamDelta,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RemoteStreamDelta {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RemoteErrorEnvelope {
    pub error: RemoteErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RemoteErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

/// Pulls `error.message` out of a JSON error body.
pub(crate) fn extract_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<RemoteErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error.message)
        .filter(|message| !message.trim().is_empty())
}
