//! Anthropic provider implementation over the native Messages API.

use std::sync::Arc;

use async_stream::try_stream;
use futures_util::StreamExt;
use qcommon::CompletionOptions;

use crate::{
    CanonicalError, ChatMessage, ChatProvider, CompletionResult, CompletionStream,
    ProviderDefaults, ProviderFuture, ProviderId, SecretString, normalize, validate_history,
};

use super::transport::{AnthropicHttpTransport, AnthropicTransport};
use super::types::{AnthropicRequest, AnthropicStreamChunk, split_system};

#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    api_key: SecretString,
    transport: Arc<dyn AnthropicTransport>,
    defaults: ProviderDefaults,
}

impl AnthropicProvider {
    pub const DEFAULT_MODEL: &'static str = "claude-sonnet-4-20250514";

    pub fn new(api_key: impl Into<SecretString>, transport: Arc<dyn AnthropicTransport>) -> Self {
        Self {
            api_key: api_key.into(),
            transport,
            defaults: ProviderDefaults::new(Self::DEFAULT_MODEL),
        }
    }

    pub fn from_api_key(api_key: impl Into<SecretString>) -> Self {
        Self::new(
            api_key,
            Arc::new(AnthropicHttpTransport::new(reqwest::Client::new())),
        )
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.defaults.model = model.into();
        self
    }

    pub fn with_defaults(mut self, defaults: ProviderDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub(crate) fn build_request(
        &self,
        history: Vec<ChatMessage>,
        options: &CompletionOptions,
        stream: bool,
    ) -> Result<AnthropicRequest, CanonicalError> {
        validate_history(ProviderId::Anthropic, &history)?;
        let resolved = self.defaults.resolve(ProviderId::Anthropic, options)?;
        let (system, messages) = split_system(history);

        Ok(AnthropicRequest {
            model: resolved.model,
            system,
            messages,
            temperature: resolved.temperature,
            max_tokens: resolved.max_output_tokens,
            stream,
        })
    }
}

impl ChatProvider for AnthropicProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Anthropic
    }

    fn default_model(&self) -> &str {
        &self.defaults.model
    }

    fn complete<'a>(
        &'a self,
        history: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> ProviderFuture<'a, Result<CompletionResult, CanonicalError>> {
        Box::pin(async move {
            let request = self.build_request(history, &options, false)?;
            let response = self
                .transport
                .complete(request, self.api_key.clone())
                .await
                .map_err(|failure| normalize(ProviderId::Anthropic, failure))?;

            Ok(response.into_completion_result())
        })
    }

    fn complete_stream<'a>(
        &'a self,
        history: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> ProviderFuture<'a, Result<CompletionStream<'a>, CanonicalError>> {
        Box::pin(async move {
            let request = self.build_request(history, &options, true)?;
            let model = request.model.clone();
            let mut chunks = self
                .transport
                .stream(request, self.api_key.clone())
                .await
                .map_err(|failure| normalize(ProviderId::Anthropic, failure))?;

            let fragments = try_stream! {
                while let Some(chunk) = chunks.next().await {
                    let chunk = chunk.map_err(|failure| normalize(ProviderId::Anthropic, failure))?;
                    if let AnthropicStreamChunk::TextDelta(text) = chunk {
                        yield text;
                    }
                }
            };

            Ok(CompletionStream::new(ProviderId::Anthropic, model, fragments))
        })
    }
}
