//! Backend failure classification.
//!
//! Adapters report what the backend said as a [`BackendFailure`]; [`normalize`]
//! turns it into the one [`CanonicalError`] shape callers ever see.
//!
//! ```rust
//! use qprovider::{BackendFailure, CanonicalErrorKind, ProviderId, normalize};
//!
//! let error = normalize(
//!     ProviderId::OpenAi,
//!     BackendFailure::status(400).with_subcode("context_length_exceeded"),
//! );
//! assert_eq!(error.kind, CanonicalErrorKind::ContextTooLong);
//! ```

use crate::{CanonicalError, CanonicalErrorKind, ProviderId};

/// Subcode adapters attach when the backend reports an oversized prompt.
pub const CONTEXT_LENGTH_SUBCODE: &str = "context_length_exceeded";

/// Raw failure observed at an adapter boundary.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BackendFailure {
    /// HTTP-equivalent status; `None` when no response was received.
    pub status: Option<u16>,
    pub subcode: Option<String>,
    pub detail: Option<String>,
}

impl BackendFailure {
    pub fn status(status: u16) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Failure with no backend status, such as a dropped connection.
    pub fn transport(detail: impl Into<String>) -> Self {
        Self::default().with_detail(detail)
    }

    pub fn with_subcode(mut self, subcode: impl Into<String>) -> Self {
        self.subcode = Some(subcode.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn is_context_length(&self) -> bool {
        self.subcode.as_deref() == Some(CONTEXT_LENGTH_SUBCODE)
    }
}

pub fn classify(status: Option<u16>, context_length: bool) -> CanonicalErrorKind {
    match status {
        Some(401) => CanonicalErrorKind::Auth,
        Some(429) => CanonicalErrorKind::RateLimit,
        Some(400) if context_length => CanonicalErrorKind::ContextTooLong,
        Some(400) => CanonicalErrorKind::InvalidRequest,
        Some(404) => CanonicalErrorKind::ModelNotFound,
        Some(500 | 502 | 503) => CanonicalErrorKind::BackendUnavailable,
        _ => CanonicalErrorKind::Unknown,
    }
}

pub fn normalize(provider: ProviderId, failure: BackendFailure) -> CanonicalError {
    let kind = classify(failure.status, failure.is_context_length());
    let error = CanonicalError::new(kind, provider);

    match failure.detail {
        Some(detail) => error.with_detail(detail),
        None => error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROVIDERS: [ProviderId; 3] = [ProviderId::OpenAi, ProviderId::Anthropic, ProviderId::Mock];

    #[test]
    fn rate_limit_is_identical_for_every_provider() {
        for provider in PROVIDERS {
            let error = normalize(provider, BackendFailure::status(429).with_detail("slow down"));
            assert_eq!(error.kind, CanonicalErrorKind::RateLimit);
            assert!(error.retryable);
            assert_eq!(error.transport_status(), 429);
            assert_eq!(error.provider, provider);
        }
    }

    #[test]
    fn status_table_maps_to_expected_kinds() {
        let cases = [
            (Some(401), None, CanonicalErrorKind::Auth),
            (Some(429), None, CanonicalErrorKind::RateLimit),
            (
                Some(400),
                Some(CONTEXT_LENGTH_SUBCODE),
                CanonicalErrorKind::ContextTooLong,
            ),
            (Some(400), Some("invalid_value"), CanonicalErrorKind::InvalidRequest),
            (Some(400), None, CanonicalErrorKind::InvalidRequest),
            (Some(404), None, CanonicalErrorKind::ModelNotFound),
            (Some(500), None, CanonicalErrorKind::BackendUnavailable),
            (Some(502), None, CanonicalErrorKind::BackendUnavailable),
            (Some(503), None, CanonicalErrorKind::BackendUnavailable),
            (Some(403), None, CanonicalErrorKind::Unknown),
            (Some(504), None, CanonicalErrorKind::Unknown),
            (None, None, CanonicalErrorKind::Unknown),
        ];

        for (status, subcode, expected) in cases {
            let mut failure = BackendFailure {
                status,
                ..BackendFailure::default()
            };
            if let Some(subcode) = subcode {
                failure = failure.with_subcode(subcode);
            }

            assert_eq!(
                normalize(ProviderId::OpenAi, failure).kind,
                expected,
                "status {status:?} subcode {subcode:?}"
            );
        }
    }

    #[test]
    fn context_subcode_only_matters_for_bad_request() {
        let error = normalize(
            ProviderId::Anthropic,
            BackendFailure::status(500).with_subcode(CONTEXT_LENGTH_SUBCODE),
        );
        assert_eq!(error.kind, CanonicalErrorKind::BackendUnavailable);
    }

    #[test]
    fn normalization_is_pure() {
        let failure = BackendFailure::status(503).with_detail("overloaded");
        let first = normalize(ProviderId::Anthropic, failure.clone());
        let second = normalize(ProviderId::Anthropic, failure);
        assert_eq!(first, second);
        assert_eq!(first.original_detail.as_deref(), Some("overloaded"));
    }
}
