//! Common `qprovider` imports for downstream crates.

pub use crate::adapters::mock::MockProvider;
pub use crate::{
    BackendFailure, CanonicalError, CanonicalErrorKind, ChatMessage, ChatProvider,
    CompletionResult, CompletionStream, ProviderFuture, ProviderId, Role, normalize,
};
pub use qcommon::{BoxFuture, CompletionOptions};
