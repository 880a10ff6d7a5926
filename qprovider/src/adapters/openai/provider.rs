//! OpenAI provider implementation over transport and shared models.

use std::sync::Arc;

use async_stream::try_stream;
use futures_util::StreamExt;
use qcommon::CompletionOptions;

use crate::{
    CanonicalError, ChatMessage, ChatProvider, CompletionResult, CompletionStream,
    ProviderDefaults, ProviderFuture, ProviderId, SecretString, normalize, validate_history,
};

use super::transport::{OpenAiHttpTransport, OpenAiTransport};
use super::types::{OpenAiMessage, OpenAiRequest, OpenAiStreamChunk};

#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    api_key: SecretString,
    transport: Arc<dyn OpenAiTransport>,
    defaults: ProviderDefaults,
}

impl OpenAiProvider {
    pub const DEFAULT_MODEL: &'static str = "gpt-4o-mini";

    pub fn new(api_key: impl Into<SecretString>, transport: Arc<dyn OpenAiTransport>) -> Self {
        Self {
            api_key: api_key.into(),
            transport,
            defaults: ProviderDefaults::new(Self::DEFAULT_MODEL),
        }
    }

    /// Provider over the public HTTP API with a default client.
    pub fn from_api_key(api_key: impl Into<SecretString>) -> Self {
        Self::new(
            api_key,
            Arc::new(OpenAiHttpTransport::new(reqwest::Client::new())),
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

    pub(crate) fn build_openai_request(
        &self,
        history: Vec<ChatMessage>,
        options: &CompletionOptions,
        stream: bool,
    ) -> Result<OpenAiRequest, CanonicalError> {
        validate_history(ProviderId::OpenAi, &history)?;
        let resolved = self.defaults.resolve(ProviderId::OpenAi, options)?;

        Ok(OpenAiRequest {
            model: resolved.model,
            messages: history.into_iter().map(OpenAiMessage::from).collect(),
            temperature: resolved.temperature,
            max_tokens: resolved.max_output_tokens,
            stream,
        })
    }
}

impl ChatProvider for OpenAiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenAi
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
            let request = self.build_openai_request(history, &options, false)?;
            let response = self
                .transport
                .complete(request, self.api_key.clone())
                .await
                .map_err(|failure| normalize(ProviderId::OpenAi, failure))?;

            Ok(response.into_completion_result())
        })
    }

    fn complete_stream<'a>(
        &'a self,
        history: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> ProviderFuture<'a, Result<CompletionStream<'a>, CanonicalError>> {
        Box::pin(async move {
            let request = self.build_openai_request(history, &options, true)?;
            let model = request.model.clone();
            let mut chunks = self
                .transport
                .stream(request, self.api_key.clone())
                .await
                .map_err(|failure| normalize(ProviderId::OpenAi, failure))?;

            let fragments = try_stream! {
                while let Some(chunk) = chunks.next().await {
                    let chunk = chunk.map_err(|failure| normalize(ProviderId::OpenAi, failure))?;
                    if let OpenAiStreamChunk::TextDelta(text) = chunk {
                        yield text;
                    }
                }
            };

            Ok(CompletionStream::new(ProviderId::OpenAi, model, fragments))
        })
    }
}
