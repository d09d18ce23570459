//! Shared provider error kinds and error value helpers.
//!
//! ```rust
//! use pprovider::{ProviderError, ProviderErrorKind};
//!
//! let auth = ProviderError::authentication("bad key");
//! assert!(!auth.retryable);
//!
//! let down = ProviderError::from_status(503, "upstream overloaded");
//! assert_eq!(down.kind, ProviderErrorKind::BackendUnavailable);
//! assert_eq!(down.status, Some(503));
//! assert!(down.retryable);
//! ```

use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    InvalidRequest,
    Authentication,
    BackendUnavailable,
    NoCompletionProduced,
    ModelNotSupported,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
    /// HTTP status reported by the backend, when one was received.
    pub status: Option<u16>,
    pub retryable: bool,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            retryable,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::InvalidRequest, message, false)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Authentication, message, false)
    }

    /// Transport failures and unreachable backends; retry is allowed.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::BackendUnavailable, message, true)
    }

    pub fn no_completion(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::NoCompletionProduced, message, false)
    }

    pub fn model_not_supported(model: &str) -> Self {
        Self::new(
            ProviderErrorKind::ModelNotSupported,
            format!("no gateway supports model '{model}'"),
            false,
        )
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Other, message, false)
    }

    /// Maps a non-success HTTP status to `BackendUnavailable`.
    ///
    /// 408, 429 and 5xx are retryable. 401 and 403 are additionally flagged by
    /// [`ProviderError::is_authentication_failure`].
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let retryable = status == 408 || status == 429 || (500..=599).contains(&status);
        Self::new(ProviderErrorKind::BackendUnavailable, message, retryable).with_status(status)
    }

    pub fn is_authentication_failure(&self) -> bool {
        self.kind == ProviderErrorKind::Authentication || matches!(self.status, Some(401 | 403))
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{:?} (status {status}): {}", self.kind, self.message),
            None => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

impl Error for ProviderError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_status_classifies_retryable_codes() {
        assert!(ProviderError::from_status(500, "boom").retryable);
        assert!(ProviderError::from_status(429, "slow down").retryable);
        assert!(ProviderError::from_status(408, "timeout").retryable);
        assert!(!ProviderError::from_status(400, "bad").retryable);
        assert!(!ProviderError::from_status(404, "missing").retryable);
    }

    #[test]
    fn auth_statuses_stay_backend_unavailable_but_flag_authentication() {
        let error = ProviderError::from_status(401, "invalid key");
        assert_eq!(error.kind, ProviderErrorKind::BackendUnavailable);
        assert!(error.is_authentication_failure());
        assert!(!ProviderError::from_status(502, "bad gateway").is_authentication_failure());
    }

    #[test]
    fn display_includes_status_when_present() {
        let error = ProviderError::from_status(503, "down");
        assert_eq!(error.to_string(), "BackendUnavailable (status 503): down");
        assert_eq!(
            ProviderError::other("x").to_string(),
            "Other: x".to_string()
        );
    }
}
