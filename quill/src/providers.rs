//! Provider construction from configuration.

use std::sync::Arc;
use std::time::Duration;

use qprovider::adapters::mock::MockProvider;
use qprovider::{CanonicalError, CanonicalErrorKind, ChatProvider, ProviderId};
use reqwest::Client;

use crate::config::{ApiProviderSettings, MockProviderSettings, ProviderSettings};

/// Builds the configured provider. `request_timeout` bounds connection setup
/// and each wait for backend bytes, not the whole response, so a long answer
/// that keeps streaming is never cut off.
pub fn build_provider(
    settings: &ProviderSettings,
    request_timeout: Duration,
) -> Result<Arc<dyn ChatProvider>, CanonicalError> {
    match settings {
        ProviderSettings::OpenAi(api) => {
            let http = http_client(ProviderId::OpenAi, request_timeout)?;
            build_openai_provider(api, http)
        }
        ProviderSettings::Anthropic(api) => {
            let http = http_client(ProviderId::Anthropic, request_timeout)?;
            build_anthropic_provider(api, http)
        }
        ProviderSettings::Mock(mock) => Ok(build_mock_provider(mock)),
    }
}

pub fn build_mock_provider(settings: &MockProviderSettings) -> Arc<dyn ChatProvider> {
    let mut provider = MockProvider::new().with_delay(settings.delay);
    if settings.delay.is_zero() {
        provider = provider.with_word_delay(Duration::ZERO);
    }
    if let Some(response) = &settings.response {
        provider = provider.with_response(response.clone());
    }
    Arc::new(provider)
}

fn http_client(provider: ProviderId, timeout: Duration) -> Result<Client, CanonicalError> {
    Client::builder()
        .connect_timeout(timeout)
        .read_timeout(timeout)
        .build()
        .map_err(|error| {
            CanonicalError::new(CanonicalErrorKind::Unknown, provider)
                .with_detail(format!("failed to build http client: {error}"))
        })
}

fn reject_blank_key(provider: ProviderId, api: &ApiProviderSettings) -> Result<(), CanonicalError> {
    if api.api_key.is_blank() {
        return Err(CanonicalError::new(CanonicalErrorKind::Auth, provider)
            .with_detail("provider API key must not be empty"));
    }
    Ok(())
}

#[cfg(feature = "provider-openai")]
fn build_openai_provider(
    api: &ApiProviderSettings,
    http: Client,
) -> Result<Arc<dyn ChatProvider>, CanonicalError> {
    use qprovider::adapters::openai::{OpenAiHttpTransport, OpenAiProvider};

    reject_blank_key(ProviderId::OpenAi, api)?;
    let mut transport = OpenAiHttpTransport::new(http);
    if let Some(base_url) = &api.base_url {
        transport = transport.with_base_url(base_url.clone());
    }
    Ok(Arc::new(
        OpenAiProvider::new(api.api_key.clone(), Arc::new(transport))
            .with_default_model(api.model.clone()),
    ))
}

#[cfg(not(feature = "provider-openai"))]
fn build_openai_provider(
    _api: &ApiProviderSettings,
    _http: Client,
) -> Result<Arc<dyn ChatProvider>, CanonicalError> {
    Err(
        CanonicalError::new(CanonicalErrorKind::InvalidRequest, ProviderId::OpenAi)
            .with_detail("provider-openai feature is not enabled on quill"),
    )
}

#[cfg(feature = "provider-anthropic")]
fn build_anthropic_provider(
    api: &ApiProviderSettings,
    http: Client,
) -> Result<Arc<dyn ChatProvider>, CanonicalError> {
    use qprovider::adapters::anthropic::{AnthropicHttpTransport, AnthropicProvider};

    reject_blank_key(ProviderId::Anthropic, api)?;
    let mut transport = AnthropicHttpTransport::new(http);
    if let Some(base_url) = &api.base_url {
        transport = transport.with_base_url(base_url.clone());
    }
    Ok(Arc::new(
        AnthropicProvider::new(api.api_key.clone(), Arc::new(transport))
            .with_default_model(api.model.clone()),
    ))
}

#[cfg(not(feature = "provider-anthropic"))]
fn build_anthropic_provider(
    _api: &ApiProviderSettings,
    _http: Client,
) -> Result<Arc<dyn ChatProvider>, CanonicalError> {
    Err(
        CanonicalError::new(CanonicalErrorKind::InvalidRequest, ProviderId::Anthropic)
            .with_detail("provider-anthropic feature is not enabled on quill"),
    )
}

#[cfg(test)]
mod tests {
    use qprovider::SecretString;

    use super::*;

    fn api(key: &str) -> ApiProviderSettings {
        ApiProviderSettings {
            api_key: SecretString::new(key),
            model: "custom-model".to_string(),
            base_url: Some("http://127.0.0.1:1/v1".to_string()),
        }
    }

    #[test]
    fn mock_settings_build_mock_provider() {
        let provider = build_provider(
            &ProviderSettings::Mock(MockProviderSettings::default()),
            Duration::from_secs(1),
        )
        .expect("mock provider");
        assert_eq!(provider.id(), ProviderId::Mock);
        assert_eq!(provider.default_model(), MockProvider::DEFAULT_MODEL);
    }

    #[cfg(feature = "provider-openai")]
    #[test]
    fn openai_provider_uses_configured_default_model() {
        let provider = build_provider(&ProviderSettings::OpenAi(api("sk")), Duration::from_secs(1))
            .expect("openai provider");
        assert_eq!(provider.id(), ProviderId::OpenAi);
        assert_eq!(provider.default_model(), "custom-model");
    }

    #[cfg(feature = "provider-anthropic")]
    #[test]
    fn anthropic_provider_rejects_blank_key() {
        let error = build_provider(
            &ProviderSettings::Anthropic(api(" ")),
            Duration::from_secs(1),
        )
        .expect_err("blank key");
        assert_eq!(error.kind, CanonicalErrorKind::Auth);
        assert_eq!(error.provider, ProviderId::Anthropic);
    }
}
