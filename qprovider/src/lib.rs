//! Provider abstraction shared by conversation runtimes.
//!
//! Every backend implements [`ChatProvider`]: one request/response call and
//! one incremental text stream over the same canonical [`ChatMessage`]
//! history. Backend failures never leave an adapter as anything but a
//! [`CanonicalError`].
//!
//! ```rust
//! use std::sync::Arc;
//! use qprovider::{BackendFailure, CanonicalErrorKind, ChatProvider, ProviderId, normalize};
//! use qprovider::adapters::mock::MockProvider;
//!
//! let provider: Arc<dyn ChatProvider> = Arc::new(MockProvider::instant());
//! assert_eq!(provider.id(), ProviderId::Mock);
//! assert_eq!(provider.default_model(), "mock-model");
//!
//! let error = normalize(provider.id(), BackendFailure::status(429));
//! assert_eq!(error.kind, CanonicalErrorKind::RateLimit);
//! ```

pub mod adapters;
pub mod credentials;
pub mod error;
pub mod model;
pub mod normalize;
pub mod prelude;
pub mod provider;
pub mod stream;

pub use credentials::SecretString;
pub use error::{CanonicalError, CanonicalErrorKind};
pub use model::{
    ChatMessage, CompletionResult, ProviderDefaults, ProviderId, ResolvedOptions, Role,
    last_user_message, validate_history,
};
pub use normalize::{BackendFailure, CONTEXT_LENGTH_SUBCODE, classify, normalize};
pub use provider::{ChatProvider, ProviderFuture};
pub use stream::{BoxedTextStream, CompletionStream, TextStream, VecTextStream};
