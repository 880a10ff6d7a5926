//! Canonical provider error taxonomy.
//!
//! ```rust
//! use qprovider::{CanonicalError, CanonicalErrorKind, ProviderId};
//!
//! let limited = CanonicalError::new(CanonicalErrorKind::RateLimit, ProviderId::OpenAi);
//! assert!(limited.retryable);
//! assert_eq!(limited.kind.transport_status(), 429);
//!
//! let auth = CanonicalError::new(CanonicalErrorKind::Auth, ProviderId::Anthropic)
//!     .with_detail("invalid x-api-key");
//! assert!(!auth.retryable);
//! assert!(!auth.to_string().contains("x-api-key"));
//! ```

use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::ProviderId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalErrorKind {
    Auth,
    RateLimit,
    InvalidRequest,
    ModelNotFound,
    ContextTooLong,
    BackendUnavailable,
    Unknown,
}

impl CanonicalErrorKind {
    pub const ALL: [Self; 7] = [
        Self::Auth,
        Self::RateLimit,
        Self::InvalidRequest,
        Self::ModelNotFound,
        Self::ContextTooLong,
        Self::BackendUnavailable,
        Self::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "AUTH",
            Self::RateLimit => "RATE_LIMIT",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::ModelNotFound => "MODEL_NOT_FOUND",
            Self::ContextTooLong => "CONTEXT_TOO_LONG",
            Self::BackendUnavailable => "BACKEND_UNAVAILABLE",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn retryable(self) -> bool {
        matches!(self, Self::RateLimit | Self::BackendUnavailable)
    }

    /// Status the outermost transport boundary reports for this kind.
    pub fn transport_status(self) -> u16 {
        match self {
            Self::Auth => 401,
            Self::RateLimit => 429,
            Self::InvalidRequest | Self::ContextTooLong => 400,
            Self::ModelNotFound => 404,
            Self::BackendUnavailable => 503,
            Self::Unknown => 500,
        }
    }

    /// User-facing text. Backend wording never replaces it.
    pub fn user_message(self) -> &'static str {
        match self {
            Self::Auth => "The AI provider rejected the configured credentials.",
            Self::RateLimit => "The AI provider is rate limiting requests. Please retry shortly.",
            Self::InvalidRequest => "The AI provider rejected the request as invalid.",
            Self::ModelNotFound => "The requested model is not available.",
            Self::ContextTooLong => {
                "The conversation is too long for the model. Start a new conversation."
            }
            Self::BackendUnavailable => {
                "The AI provider is temporarily unavailable. Please retry shortly."
            }
            Self::Unknown => "An unexpected error occurred while contacting the AI provider.",
        }
    }
}

impl Display for CanonicalErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalError {
    pub kind: CanonicalErrorKind,
    pub provider: ProviderId,
    pub retryable: bool,
    /// Backend wording, kept for logs only.
    pub original_detail: Option<String>,
}

impl CanonicalError {
    pub fn new(kind: CanonicalErrorKind, provider: ProviderId) -> Self {
        Self {
            kind,
            provider,
            retryable: kind.retryable(),
            original_detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        self.original_detail = (!detail.trim().is_empty()).then_some(detail);
        self
    }

    pub fn invalid_request(provider: ProviderId, detail: impl Into<String>) -> Self {
        Self::new(CanonicalErrorKind::InvalidRequest, provider).with_detail(detail)
    }

    pub fn unknown(provider: ProviderId, detail: impl Into<String>) -> Self {
        Self::new(CanonicalErrorKind::Unknown, provider).with_detail(detail)
    }

    pub fn user_message(&self) -> &'static str {
        self.kind.user_message()
    }

    pub fn transport_status(&self) -> u16 {
        self.kind.transport_status()
    }
}

impl Display for CanonicalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.kind.user_message())
    }
}

impl Error for CanonicalError {}
