//! Provider-agnostic message, option, and result types.
//!
//! ```rust
//! use qprovider::{ChatMessage, ProviderDefaults, ProviderId, Role};
//! use qcommon::CompletionOptions;
//!
//! let message = ChatMessage::user("Summarize this diff");
//! assert_eq!(message.role(), Role::User);
//!
//! let defaults = ProviderDefaults::new("gpt-4o-mini");
//! let resolved = defaults
//!     .resolve(ProviderId::OpenAi, &CompletionOptions::default().with_model("gpt-4o"))
//!     .expect("options should resolve");
//! assert_eq!(resolved.model, "gpt-4o");
//! assert_eq!(resolved.temperature, 0.7);
//! ```

use std::fmt::{Display, Formatter};

use qcommon::CompletionOptions;

use crate::CanonicalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenAi,
    Anthropic,
    Mock,
}

impl ProviderId {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Mock => "mock",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One message of canonical history. Fields are fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    role: Role,
    content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn into_content(self) -> String {
        self.content
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResult {
    pub content: String,
    pub finish_reason: Option<String>,
    pub provider: ProviderId,
    pub model: String,
}

/// Per-adapter fallbacks applied when a [`CompletionOptions`] field is unset.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderDefaults {
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl ProviderDefaults {
    pub const DEFAULT_TEMPERATURE: f32 = 0.7;
    pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4096;

    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: Self::DEFAULT_TEMPERATURE,
            max_output_tokens: Self::DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn resolve(
        &self,
        provider: ProviderId,
        options: &CompletionOptions,
    ) -> Result<ResolvedOptions, CanonicalError> {
        let temperature = options.temperature.unwrap_or(self.temperature);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(CanonicalError::invalid_request(
                provider,
                "temperature must be in the inclusive range 0.0..=2.0",
            ));
        }

        let max_output_tokens = options.max_output_tokens.unwrap_or(self.max_output_tokens);
        if max_output_tokens == 0 {
            return Err(CanonicalError::invalid_request(
                provider,
                "max_output_tokens must be greater than zero",
            ));
        }

        Ok(ResolvedOptions {
            model: options
                .model_override()
                .map(str::to_string)
                .unwrap_or_else(|| self.model.clone()),
            temperature,
            max_output_tokens,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOptions {
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

/// History must carry at least one non-system message.
pub fn validate_history(provider: ProviderId, history: &[ChatMessage]) -> Result<(), CanonicalError> {
    if history.iter().all(|message| message.role() == Role::System) {
        return Err(CanonicalError::invalid_request(
            provider,
            "history must contain at least one user or assistant message",
        ));
    }

    Ok(())
}

/// Content of the most recent user message, if any.
pub fn last_user_message(history: &[ChatMessage]) -> Option<&str> {
    history
        .iter()
        .rev()
        .find(|message| message.role() == Role::User)
        .map(ChatMessage::content)
}
