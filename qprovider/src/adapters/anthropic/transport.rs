//! Anthropic transport trait and reqwest-based HTTP implementation.

use std::pin::Pin;

use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use reqwest::{Client, Response};

use crate::adapters::sse::{ensure_completed, request_failure, response_events};
use crate::{BackendFailure, ProviderFuture, SecretString};

use super::serde_api::{
    AnthropicApiDelta, AnthropicApiResponse, AnthropicApiStreamEvent, build_api_request,
    parse_error_body, parse_stream_event,
};
use super::types::{AnthropicRequest, AnthropicResponse, AnthropicStreamChunk};

pub type AnthropicChunkStream<'a> =
    Pin<Box<dyn Stream<Item = Result<AnthropicStreamChunk, BackendFailure>> + Send + 'a>>;

pub trait AnthropicTransport: Send + Sync + std::fmt::Debug {
    fn complete<'a>(
        &'a self,
        request: AnthropicRequest,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<AnthropicResponse, BackendFailure>>;

    fn stream<'a>(
        &'a self,
        request: AnthropicRequest,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<AnthropicChunkStream<'a>, BackendFailure>>;
}

#[derive(Debug, Clone)]
pub struct AnthropicHttpTransport {
    client: Client,
    base_url: String,
    api_version: String,
}

impl AnthropicHttpTransport {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.anthropic.com/v1";
    pub const API_VERSION: &'static str = "2023-06-01";

    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            api_version: Self::API_VERSION.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn send(
        &self,
        request: AnthropicRequest,
        api_key: &SecretString,
    ) -> Result<Response, BackendFailure> {
        let api_request = build_api_request(request);
        let response = self
            .client
            .post(self.endpoint("messages"))
            .header("x-api-key", api_key.expose())
            .header("anthropic-version", &self.api_version)
            .json(&api_request)
            .send()
            .await
            .map_err(request_failure)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(parse_error_body(Some(status), &body));
        }

        Ok(response)
    }
}

impl AnthropicTransport for AnthropicHttpTransport {
    fn complete<'a>(
        &'a self,
        request: AnthropicRequest,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<AnthropicResponse, BackendFailure>> {
        Box::pin(async move {
            let response = self.send(request, &api_key).await?;
            let parsed: AnthropicApiResponse = response.json().await.map_err(request_failure)?;

            Ok(AnthropicResponse::from(parsed))
        })
    }

    fn stream<'a>(
        &'a self,
        mut request: AnthropicRequest,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<AnthropicChunkStream<'a>, BackendFailure>> {
        Box::pin(async move {
            request.stream = true;
            let response = self.send(request, &api_key).await?;

            let stream = try_stream! {
                let mut events = Box::pin(response_events(response));
                let mut completed = false;

                while let Some(event) = events.next().await {
                    let event = event?;
                    match parse_stream_event(&event.data)? {
                        AnthropicApiStreamEvent::ContentBlockDelta {
                            delta: AnthropicApiDelta::TextDelta { text },
                        } => {
                            if !text.is_empty() {
                                yield AnthropicStreamChunk::TextDelta(text);
                            }
                        }
                        AnthropicApiStreamEvent::MessageDelta { delta } => {
                            yield AnthropicStreamChunk::Stopped {
                                stop_reason: delta.stop_reason,
                            };
                        }
                        AnthropicApiStreamEvent::MessageStop => {
                            completed = true;
                            break;
                        }
                        AnthropicApiStreamEvent::ContentBlockDelta { .. }
                        | AnthropicApiStreamEvent::Error { .. }
                        | AnthropicApiStreamEvent::Other => {}
                    }
                }

                ensure_completed(completed)?;
            };

            Ok(Box::pin(stream) as AnthropicChunkStream<'a>)
        })
    }
}
