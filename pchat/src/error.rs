//! Chat-layer errors and classification.
//!
//! ```rust
//! use pchat::{ChatError, ChatErrorKind, ExchangePhase};
//!
//! let error = ChatError::store("disk full", true).in_phase(ExchangePhase::PersistingAssistantTurn);
//! assert_eq!(error.kind, ChatErrorKind::Store);
//! assert_eq!(error.phase, Some(ExchangePhase::PersistingAssistantTurn));
//! assert!(error.retryable);
//! ```

use std::error::Error;
use std::fmt::{Display, Formatter};

use pprovider::{ProviderError, ProviderErrorKind};

use crate::ExchangePhase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatErrorKind {
    InvalidRequest,
    /// Session missing, tombstoned, or not owned by the caller.
    ValidationFailure,
    BackendUnavailable,
    NoCompletionProduced,
    Store,
    Cancelled,
    Sink,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatError {
    pub kind: ChatErrorKind,
    /// Exchange phase the error ended in, when raised during an exchange.
    pub phase: Option<ExchangePhase>,
    pub message: String,
    pub retryable: bool,
}

impl ChatError {
    pub fn new(kind: ChatErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            phase: None,
            message: message.into(),
            retryable,
        }
    }

    pub fn in_phase(mut self, phase: ExchangePhase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::InvalidRequest, message, false)
    }

    pub fn session_not_found() -> Self {
        Self::new(
            ChatErrorKind::ValidationFailure,
            "chat session not found",
            false,
        )
    }

    pub fn backend_unavailable(message: impl Into<String>, retryable: bool) -> Self {
        Self::new(ChatErrorKind::BackendUnavailable, message, retryable)
    }

    pub fn no_completion(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::NoCompletionProduced, message, false)
    }

    pub fn store(message: impl Into<String>, retryable: bool) -> Self {
        Self::new(ChatErrorKind::Store, message, retryable)
    }

    pub fn cancelled() -> Self {
        Self::new(ChatErrorKind::Cancelled, "exchange cancelled by caller", false)
    }

    pub fn sink(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Sink, message, false)
    }
}

impl Display for ChatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.phase {
            Some(phase) => write!(f, "{:?} during {phase}: {}", self.kind, self.message),
            None => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

impl Error for ChatError {}

impl From<ProviderError> for ChatError {
    fn from(value: ProviderError) -> Self {
        let kind = match value.kind {
            ProviderErrorKind::InvalidRequest | ProviderErrorKind::ModelNotSupported => {
                ChatErrorKind::InvalidRequest
            }
            ProviderErrorKind::NoCompletionProduced => ChatErrorKind::NoCompletionProduced,
            ProviderErrorKind::Authentication
            | ProviderErrorKind::BackendUnavailable
            | ProviderErrorKind::Other => ChatErrorKind::BackendUnavailable,
        };

        ChatError::new(kind, value.to_string(), value.retryable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_errors_map_to_chat_kinds() {
        let cases = [
            (ProviderError::from_status(503, "down"), ChatErrorKind::BackendUnavailable),
            (ProviderError::authentication("bad"), ChatErrorKind::BackendUnavailable),
            (ProviderError::no_completion("none"), ChatErrorKind::NoCompletionProduced),
            (ProviderError::model_not_supported("x"), ChatErrorKind::InvalidRequest),
        ];

        for (provider_error, expected) in cases {
            assert_eq!(ChatError::from(provider_error).kind, expected);
        }
    }

    #[test]
    fn retryable_flag_survives_conversion() {
        let error = ChatError::from(ProviderError::from_status(429, "slow down"));
        assert!(error.retryable);
        assert!(error.message.contains("slow down"));
    }

    #[test]
    fn display_mentions_phase() {
        let error = ChatError::cancelled().in_phase(ExchangePhase::StreamingDeltas);
        assert_eq!(
            error.to_string(),
            "Cancelled during streaming_deltas: exchange cancelled by caller"
        );
    }
}
