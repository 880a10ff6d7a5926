//! Chat-layer errors and classification.

use std::error::Error;
use std::fmt::{Display, Formatter};

use qprovider::CanonicalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatErrorKind {
    InvalidRequest,
    Provider,
    Store,
    NotFound,
    Forbidden,
    Conflict,
    AdmissionDenied,
}

impl ChatErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::Provider => "PROVIDER",
            Self::Store => "STORE",
            Self::NotFound => "NOT_FOUND",
            Self::Forbidden => "FORBIDDEN",
            Self::Conflict => "CONFLICT",
            Self::AdmissionDenied => "ADMISSION_DENIED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatError {
    pub kind: ChatErrorKind,
    pub message: String,
    /// Set when the failure came out of a provider adapter.
    pub provider_error: Option<CanonicalError>,
}

impl ChatError {
    pub fn new(kind: ChatErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            provider_error: None,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::InvalidRequest, message)
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Store, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::NotFound, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Forbidden, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Conflict, message)
    }

    pub fn admission_denied(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::AdmissionDenied, message)
    }

    pub fn provider(error: CanonicalError) -> Self {
        Self {
            kind: ChatErrorKind::Provider,
            message: error.user_message().to_string(),
            provider_error: Some(error),
        }
    }

    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match &self.provider_error {
            Some(error) => error.retryable,
            None => matches!(self.kind, ChatErrorKind::AdmissionDenied),
        }
    }
}

impl Display for ChatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for ChatError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.provider_error
            .as_ref()
            .map(|error| error as &(dyn Error + 'static))
    }
}

impl From<CanonicalError> for ChatError {
    fn from(value: CanonicalError) -> Self {
        Self::provider(value)
    }
}

#[cfg(test)]
mod tests {
    use qprovider::{CanonicalErrorKind, ProviderId};

    use super::*;

    #[test]
    fn provider_errors_keep_canonical_message_not_detail() {
        let canonical = CanonicalError::new(CanonicalErrorKind::Auth, ProviderId::OpenAi)
            .with_detail("Incorrect API key provided: sk-abc");
        let error = ChatError::from(canonical);

        assert_eq!(error.kind, ChatErrorKind::Provider);
        assert!(!error.message.contains("sk-abc"));
        assert!(!error.is_retryable());
        assert_eq!(
            error.provider_error.as_ref().map(|e| e.kind),
            Some(CanonicalErrorKind::Auth)
        );
    }

    #[test]
    fn retryability_follows_provider_then_kind() {
        let limited = ChatError::from(CanonicalError::new(
            CanonicalErrorKind::RateLimit,
            ProviderId::Anthropic,
        ));
        assert!(limited.is_retryable());
        assert!(ChatError::admission_denied("slow down").is_retryable());
        assert!(!ChatError::forbidden("nope").is_retryable());
    }

    #[test]
    fn display_names_kind() {
        let error = ChatError::not_found("session missing");
        assert_eq!(error.to_string(), "NotFound: session missing");
    }
}
