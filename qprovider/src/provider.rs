use std::future::Future;
use std::pin::Pin;

use qcommon::CompletionOptions;

use crate::{CanonicalError, ChatMessage, CompletionResult, CompletionStream, ProviderId};

pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Capability pair every backend adapter implements.
///
/// Callers hold a `dyn ChatProvider` chosen at configuration time and never
/// branch on which backend sits behind it.
pub trait ChatProvider: Send + Sync + std::fmt::Debug {
    fn id(&self) -> ProviderId;

    fn default_model(&self) -> &str;

    fn complete<'a>(
        &'a self,
        history: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> ProviderFuture<'a, Result<CompletionResult, CanonicalError>>;

    fn complete_stream<'a>(
        &'a self,
        history: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> ProviderFuture<'a, Result<CompletionStream<'a>, CanonicalError>>;
}
