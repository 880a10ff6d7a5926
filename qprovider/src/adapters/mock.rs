//! Deterministic provider for tests and offline development.
//!
//! ```rust
//! use std::time::Duration;
//! use qprovider::ChatMessage;
//! use qprovider::adapters::mock::MockProvider;
//!
//! let provider = MockProvider::new()
//!     .with_response("hello")
//!     .with_delay(Duration::ZERO);
//! let answer = provider.render_answer(&[ChatMessage::user("ping")]);
//! assert_eq!(answer, "[Mock] hello (question: ping)");
//! ```

use std::time::Duration;

use async_stream::try_stream;
use futures_timer::Delay;
use qcommon::CompletionOptions;

use crate::{
    BackendFailure, CanonicalError, ChatMessage, ChatProvider, CompletionResult,
    CompletionStream, ProviderFuture, ProviderId, last_user_message, normalize, validate_history,
};

/// Injected backend failure, raised after `after_words` streamed words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockFailure {
    pub failure: BackendFailure,
    pub after_words: usize,
}

#[derive(Debug, Clone)]
pub struct MockProvider {
    response: String,
    model: String,
    delay: Duration,
    word_delay: Duration,
    failure: Option<MockFailure>,
}

impl MockProvider {
    pub const DEFAULT_RESPONSE: &'static str = "This is a mock response.";
    pub const DEFAULT_MODEL: &'static str = "mock-model";
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(100);
    pub const DEFAULT_WORD_DELAY: Duration = Duration::from_millis(50);

    pub fn new() -> Self {
        Self {
            response: Self::DEFAULT_RESPONSE.to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
            delay: Self::DEFAULT_DELAY,
            word_delay: Self::DEFAULT_WORD_DELAY,
            failure: None,
        }
    }

    /// Zero delays; what tests usually want.
    pub fn instant() -> Self {
        Self::new()
            .with_delay(Duration::ZERO)
            .with_word_delay(Duration::ZERO)
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = response.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_word_delay(mut self, word_delay: Duration) -> Self {
        self.word_delay = word_delay;
        self
    }

    /// Fails every call before any output.
    pub fn with_failure(self, failure: BackendFailure) -> Self {
        self.with_failure_after(0, failure)
    }

    /// Streams `words` words, then fails. `complete` fails outright.
    pub fn with_failure_after(mut self, words: usize, failure: BackendFailure) -> Self {
        self.failure = Some(MockFailure {
            failure,
            after_words: words,
        });
        self
    }

    pub fn render_answer(&self, history: &[ChatMessage]) -> String {
        format!(
            "[Mock] {} (question: {})",
            self.response,
            last_user_message(history).unwrap_or("N/A")
        )
    }

    fn model_for(&self, options: &CompletionOptions) -> String {
        options
            .model_override()
            .map(str::to_string)
            .unwrap_or_else(|| self.model.clone())
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        Delay::new(duration).await;
    }
}

/// Words of `answer` as fragments whose concatenation is `answer` itself.
fn word_fragments(answer: &str) -> Vec<String> {
    answer
        .split(' ')
        .enumerate()
        .map(|(index, word)| {
            if index == 0 {
                word.to_string()
            } else {
                format!(" {word}")
            }
        })
        .collect()
}

impl ChatProvider for MockProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Mock
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn complete<'a>(
        &'a self,
        history: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> ProviderFuture<'a, Result<CompletionResult, CanonicalError>> {
        Box::pin(async move {
            validate_history(ProviderId::Mock, &history)?;
            pause(self.delay).await;

            if let Some(injected) = &self.failure {
                return Err(normalize(ProviderId::Mock, injected.failure.clone()));
            }

            Ok(CompletionResult {
                content: self.render_answer(&history),
                finish_reason: Some("stop".to_string()),
                provider: ProviderId::Mock,
                model: self.model_for(&options),
            })
        })
    }

    fn complete_stream<'a>(
        &'a self,
        history: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> ProviderFuture<'a, Result<CompletionStream<'a>, CanonicalError>> {
        Box::pin(async move {
            validate_history(ProviderId::Mock, &history)?;
            if let Some(injected) = self.failure.as_ref().filter(|f| f.after_words == 0) {
                return Err(normalize(ProviderId::Mock, injected.failure.clone()));
            }

            let mut items = word_fragments(&self.render_answer(&history))
                .into_iter()
                .map(Ok)
                .collect::<Vec<Result<String, CanonicalError>>>();
            if let Some(injected) = &self.failure {
                items.truncate(injected.after_words);
                items.push(Err(normalize(ProviderId::Mock, injected.failure.clone())));
            }

            let fragments = try_stream! {
                for item in items {
                    pause(self.word_delay).await;
                    yield item?;
                }
            };

            Ok(CompletionStream::new(ProviderId::Mock, self.model_for(&options), fragments))
        })
    }
}
