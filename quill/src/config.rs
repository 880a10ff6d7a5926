//! Process configuration read from environment variables.
//!
//! Blank values count as unset. Every setting except the selected provider's
//! API key has a default.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use qmemory::{MemoryBackendConfig, PostgresMemoryBackendConfig};
use qobserve::LogFormat;
use qprovider::{ProviderId, SecretString};

use crate::error::ConfigError;
use crate::util::parse_provider_id;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(90);
pub const DEFAULT_RATE_LIMIT: u32 = 30;
pub const DEFAULT_RATE_WINDOW: Duration = Duration::from_secs(60);
pub const DEFAULT_MOCK_DELAY: Duration = Duration::from_millis(100);

/// Credentials and endpoint for a hosted provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiProviderSettings {
    pub api_key: SecretString,
    pub model: String,
    /// `None` keeps the adapter's public endpoint.
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockProviderSettings {
    pub response: Option<String>,
    pub delay: Duration,
}

impl Default for MockProviderSettings {
    fn default() -> Self {
        Self {
            response: None,
            delay: DEFAULT_MOCK_DELAY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderSettings {
    OpenAi(ApiProviderSettings),
    Anthropic(ApiProviderSettings),
    Mock(MockProviderSettings),
}

impl ProviderSettings {
    pub fn id(&self) -> ProviderId {
        match self {
            Self::OpenAi(_) => ProviderId::OpenAi,
            Self::Anthropic(_) => ProviderId::Anthropic,
            Self::Mock(_) => ProviderId::Mock,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionSettings {
    /// Requests per window and owner. Zero disables admission control.
    pub limit: u32,
    pub window: Duration,
}

impl Default for AdmissionSettings {
    fn default() -> Self {
        Self {
            limit: DEFAULT_RATE_LIMIT,
            window: DEFAULT_RATE_WINDOW,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuillConfig {
    pub provider: ProviderSettings,
    pub session_timeout: Duration,
    pub request_timeout: Duration,
    pub storage: MemoryBackendConfig,
    pub log_format: LogFormat,
    pub admission: AdmissionSettings,
    /// Inbound `model` allow-list; empty accepts any model.
    pub allowed_models: Vec<String>,
}

impl QuillConfig {
    /// Defaults around the given provider, with in-memory storage.
    pub fn new(provider: ProviderSettings) -> Self {
        Self {
            provider,
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            storage: MemoryBackendConfig::InMemory,
            log_format: LogFormat::default(),
            admission: AdmissionSettings::default(),
            allowed_models: Vec::new(),
        }
    }

    /// Mock provider with no delays and in-memory storage.
    pub fn mock() -> Self {
        Self::new(ProviderSettings::Mock(MockProviderSettings {
            response: None,
            delay: Duration::ZERO,
        }))
    }

    pub fn with_storage(mut self, storage: MemoryBackendConfig) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    pub fn with_admission(mut self, limit: u32, window: Duration) -> Self {
        self.admission = AdmissionSettings { limit, window };
        self
    }

    pub fn with_allowed_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_models = models.into_iter().map(Into::into).collect();
        self
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(lookup);

        let provider = parse_provider(&env)?;
        let session_minutes = env.parse::<u64>("SESSION_TIMEOUT_MINUTES")?.unwrap_or(30);
        if session_minutes == 0 {
            return Err(ConfigError::invalid(
                "SESSION_TIMEOUT_MINUTES",
                "must be at least 1",
            ));
        }
        let session_secs = session_minutes.checked_mul(60).ok_or_else(|| {
            ConfigError::invalid("SESSION_TIMEOUT_MINUTES", "is too large")
        })?;
        let request_secs = env.parse::<u64>("QUILL_REQUEST_TIMEOUT_SECS")?;
        if request_secs == Some(0) {
            return Err(ConfigError::invalid(
                "QUILL_REQUEST_TIMEOUT_SECS",
                "must be at least 1",
            ));
        }

        let log_format = match env.get("QUILL_LOG_FORMAT") {
            Some(value) => LogFormat::from_str(&value)
                .map_err(|error| ConfigError::invalid("QUILL_LOG_FORMAT", error.message))?,
            None => LogFormat::default(),
        };

        let window_secs = env.parse::<u64>("QUILL_RATE_WINDOW_SECS")?;
        if window_secs == Some(0) {
            return Err(ConfigError::invalid(
                "QUILL_RATE_WINDOW_SECS",
                "must be at least 1",
            ));
        }

        Ok(Self {
            provider,
            session_timeout: Duration::from_secs(session_secs),
            request_timeout: request_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            storage: parse_storage(&env)?,
            log_format,
            admission: AdmissionSettings {
                limit: env
                    .parse::<u32>("QUILL_RATE_LIMIT")?
                    .unwrap_or(DEFAULT_RATE_LIMIT),
                window: window_secs
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_RATE_WINDOW),
            },
            allowed_models: env
                .get("QUILL_ALLOWED_MODELS")
                .map(|value| {
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|model| !model.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn parse<T>(&self, name: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
    {
        self.get(name)
            .map(|value| {
                value.parse::<T>().map_err(|_| {
                    ConfigError::invalid(name, format!("'{value}' is not a valid number"))
                })
            })
            .transpose()
    }

    fn require(&self, name: &'static str, reason: &str) -> Result<String, ConfigError> {
        self.get(name)
            .ok_or_else(|| ConfigError::missing(name, reason.to_string()))
    }
}

fn parse_provider<F>(env: &Lookup<F>) -> Result<ProviderSettings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let selected = match env.get("AI_PROVIDER") {
        Some(value) => parse_provider_id(&value).ok_or_else(|| {
            ConfigError::invalid(
                "AI_PROVIDER",
                format!("unknown provider '{value}', expected openai, anthropic or mock"),
            )
        })?,
        None => ProviderId::OpenAi,
    };

    Ok(match selected {
        ProviderId::OpenAi => ProviderSettings::OpenAi(ApiProviderSettings {
            api_key: SecretString::new(
                env.require("OPENAI_API_KEY", "required when AI_PROVIDER is openai")?,
            ),
            model: env
                .get("OPENAI_MODEL")
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            base_url: env.get("OPENAI_BASE_URL"),
        }),
        ProviderId::Anthropic => ProviderSettings::Anthropic(ApiProviderSettings {
            api_key: SecretString::new(
                env.require("ANTHROPIC_API_KEY", "required when AI_PROVIDER is anthropic")?,
            ),
            model: env
                .get("ANTHROPIC_MODEL")
                .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string()),
            base_url: env.get("ANTHROPIC_BASE_URL"),
        }),
        ProviderId::Mock => ProviderSettings::Mock(MockProviderSettings {
            response: env.get("QUILL_MOCK_RESPONSE"),
            delay: env
                .parse::<u64>("QUILL_MOCK_DELAY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_MOCK_DELAY),
        }),
    })
}

fn parse_storage<F>(env: &Lookup<F>) -> Result<MemoryBackendConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let kind = env
        .get("QUILL_STORAGE")
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_else(|| "sqlite".to_string());

    match kind.as_str() {
        "sqlite" => Ok(match env.get("QUILL_SQLITE_PATH") {
            Some(path) => MemoryBackendConfig::Sqlite {
                path: PathBuf::from(path),
            },
            None => MemoryBackendConfig::default(),
        }),
        "memory" | "in-memory" => Ok(MemoryBackendConfig::InMemory),
        "postgres" | "postgresql" => {
            let reason = "required when QUILL_STORAGE is postgres";
            Ok(MemoryBackendConfig::Postgres(PostgresMemoryBackendConfig {
                host: env.require("DB_HOST", reason)?,
                port: env
                    .parse::<u16>("DB_PORT")?
                    .unwrap_or(PostgresMemoryBackendConfig::DEFAULT_PORT),
                database: env.require("DB_DATABASE", reason)?,
                username: env.require("DB_USERNAME", reason)?,
                password: env.get("DB_PASSWORD").unwrap_or_default(),
            }))
        }
        other => Err(ConfigError::invalid(
            "QUILL_STORAGE",
            format!("unknown storage '{other}', expected sqlite, postgres or memory"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::error::ConfigErrorKind;

    fn config_from(pairs: &[(&str, &str)]) -> Result<QuillConfig, ConfigError> {
        let vars = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        QuillConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn openai_is_the_default_provider_and_needs_a_key() {
        let error = config_from(&[]).expect_err("key required");
        assert_eq!(error.kind, ConfigErrorKind::Missing);
        assert_eq!(error.variable, "OPENAI_API_KEY");

        let config = config_from(&[("OPENAI_API_KEY", "sk-test")]).expect("config");
        let ProviderSettings::OpenAi(settings) = &config.provider else {
            panic!("expected openai: {:?}", config.provider);
        };
        assert_eq!(settings.api_key.expose(), "sk-test");
        assert_eq!(settings.model, DEFAULT_OPENAI_MODEL);
        assert_eq!(settings.base_url, None);
        assert_eq!(config.session_timeout, Duration::from_secs(1800));
        assert_eq!(config.request_timeout, Duration::from_secs(90));
        assert_eq!(config.admission, AdmissionSettings::default());
        assert!(config.allowed_models.is_empty());
        assert!(matches!(config.storage, MemoryBackendConfig::Sqlite { .. }));
    }

    #[test]
    fn claude_alias_selects_anthropic_with_its_own_key() {
        let error = config_from(&[("AI_PROVIDER", "claude"), ("OPENAI_API_KEY", "sk")])
            .expect_err("anthropic key required");
        assert_eq!(error.variable, "ANTHROPIC_API_KEY");

        let config = config_from(&[
            ("AI_PROVIDER", "Claude"),
            ("ANTHROPIC_API_KEY", "ak"),
            ("ANTHROPIC_MODEL", "claude-3-5-haiku-latest"),
            ("ANTHROPIC_BASE_URL", "http://localhost:9000/v1"),
        ])
        .expect("config");
        let ProviderSettings::Anthropic(settings) = &config.provider else {
            panic!("expected anthropic: {:?}", config.provider);
        };
        assert_eq!(settings.model, "claude-3-5-haiku-latest");
        assert_eq!(
            settings.base_url.as_deref(),
            Some("http://localhost:9000/v1")
        );
        assert_eq!(config.provider.id(), ProviderId::Anthropic);
    }

    #[test]
    fn mock_provider_needs_no_key() {
        let config = config_from(&[
            ("AI_PROVIDER", "mock"),
            ("QUILL_MOCK_RESPONSE", "canned"),
            ("QUILL_MOCK_DELAY_MS", "5"),
        ])
        .expect("config");
        assert_eq!(
            config.provider,
            ProviderSettings::Mock(MockProviderSettings {
                response: Some("canned".to_string()),
                delay: Duration::from_millis(5),
            })
        );
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let error = config_from(&[("AI_PROVIDER", "gemini")]).expect_err("unknown");
        assert_eq!(error.kind, ConfigErrorKind::Invalid);
        assert_eq!(error.variable, "AI_PROVIDER");
    }

    #[test]
    fn blank_values_count_as_unset() {
        let error = config_from(&[("AI_PROVIDER", "openai"), ("OPENAI_API_KEY", "   ")])
            .expect_err("blank key");
        assert_eq!(error.kind, ConfigErrorKind::Missing);
    }

    #[test]
    fn numeric_settings_are_validated() {
        let error = config_from(&[("AI_PROVIDER", "mock"), ("SESSION_TIMEOUT_MINUTES", "soon")])
            .expect_err("not a number");
        assert_eq!(error.variable, "SESSION_TIMEOUT_MINUTES");

        let error = config_from(&[("AI_PROVIDER", "mock"), ("SESSION_TIMEOUT_MINUTES", "0")])
            .expect_err("zero window");
        assert_eq!(error.kind, ConfigErrorKind::Invalid);

        let config = config_from(&[
            ("AI_PROVIDER", "mock"),
            ("SESSION_TIMEOUT_MINUTES", "5"),
            ("QUILL_REQUEST_TIMEOUT_SECS", "10"),
            ("QUILL_RATE_LIMIT", "0"),
            ("QUILL_RATE_WINDOW_SECS", "30"),
        ])
        .expect("config");
        assert_eq!(config.session_timeout, Duration::from_secs(300));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.admission.limit, 0);
        assert_eq!(config.admission.window, Duration::from_secs(30));
    }

    #[test]
    fn oversized_session_timeout_is_rejected() {
        let minutes = u64::MAX.to_string();
        let error = config_from(&[
            ("AI_PROVIDER", "mock"),
            ("SESSION_TIMEOUT_MINUTES", minutes.as_str()),
        ])
        .expect_err("minutes overflow seconds");
        assert_eq!(error.kind, ConfigErrorKind::Invalid);
        assert_eq!(error.variable, "SESSION_TIMEOUT_MINUTES");
    }

    #[test]
    fn storage_selection_reads_database_settings() {
        let config = config_from(&[
            ("AI_PROVIDER", "mock"),
            ("QUILL_STORAGE", "postgres"),
            ("DB_HOST", "db"),
            ("DB_DATABASE", "quill"),
            ("DB_USERNAME", "app"),
            ("DB_PASSWORD", "pw"),
        ])
        .expect("config");
        assert_eq!(
            config.storage,
            MemoryBackendConfig::Postgres(PostgresMemoryBackendConfig {
                host: "db".to_string(),
                port: 5432,
                database: "quill".to_string(),
                username: "app".to_string(),
                password: "pw".to_string(),
            })
        );

        let error = config_from(&[("AI_PROVIDER", "mock"), ("QUILL_STORAGE", "postgres")])
            .expect_err("host required");
        assert_eq!(error.variable, "DB_HOST");

        let config = config_from(&[
            ("AI_PROVIDER", "mock"),
            ("QUILL_STORAGE", "sqlite"),
            ("QUILL_SQLITE_PATH", "/tmp/quill.db"),
        ])
        .expect("config");
        assert_eq!(
            config.storage,
            MemoryBackendConfig::Sqlite {
                path: PathBuf::from("/tmp/quill.db")
            }
        );

        let config =
            config_from(&[("AI_PROVIDER", "mock"), ("QUILL_STORAGE", "memory")]).expect("config");
        assert_eq!(config.storage, MemoryBackendConfig::InMemory);
    }

    #[test]
    fn log_format_and_allowed_models_are_parsed() {
        let config = config_from(&[
            ("AI_PROVIDER", "mock"),
            ("QUILL_LOG_FORMAT", "json"),
            ("QUILL_ALLOWED_MODELS", "gpt-4o, gpt-4o-mini,,"),
        ])
        .expect("config");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.allowed_models, vec!["gpt-4o", "gpt-4o-mini"]);

        let error = config_from(&[("AI_PROVIDER", "mock"), ("QUILL_LOG_FORMAT", "xml")])
            .expect_err("bad format");
        assert_eq!(error.variable, "QUILL_LOG_FORMAT");
    }
}
