//! OpenAI transport trait and reqwest-based HTTP implementation.

use std::pin::Pin;

use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use reqwest::{Client, Response};

use crate::adapters::sse::{ensure_completed, request_failure, response_events};
use crate::{BackendFailure, ProviderFuture, SecretString};

use super::serde_api::{
    OpenAiApiResponse, build_api_request, parse_error_body, parse_stream_payload,
};
use super::types::{OpenAiRequest, OpenAiResponse, OpenAiStreamChunk};

pub type OpenAiChunkStream<'a> =
    Pin<Box<dyn Stream<Item = Result<OpenAiStreamChunk, BackendFailure>> + Send + 'a>>;

pub trait OpenAiTransport: Send + Sync + std::fmt::Debug {
    fn complete<'a>(
        &'a self,
        request: OpenAiRequest,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<OpenAiResponse, BackendFailure>>;

    fn stream<'a>(
        &'a self,
        request: OpenAiRequest,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<OpenAiChunkStream<'a>, BackendFailure>>;
}

#[derive(Debug, Clone)]
pub struct OpenAiHttpTransport {
    client: Client,
    base_url: String,
}

impl OpenAiHttpTransport {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";

    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: Self::DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn send(
        &self,
        request: OpenAiRequest,
        api_key: &SecretString,
    ) -> Result<Response, BackendFailure> {
        let api_request = build_api_request(request);
        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(api_key.expose())
            .json(&api_request)
            .send()
            .await
            .map_err(request_failure)?;

        if !response.status().is_success() {
            return Err(Self::parse_error(response).await);
        }

        Ok(response)
    }

    async fn parse_error(response: Response) -> BackendFailure {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        parse_error_body(Some(status), &body)
    }
}

impl OpenAiTransport for OpenAiHttpTransport {
    fn complete<'a>(
        &'a self,
        request: OpenAiRequest,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<OpenAiResponse, BackendFailure>> {
        Box::pin(async move {
            let response = self.send(request, &api_key).await?;
            let parsed: OpenAiApiResponse = response.json().await.map_err(request_failure)?;

            OpenAiResponse::try_from(parsed)
        })
    }

    fn stream<'a>(
        &'a self,
        mut request: OpenAiRequest,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<OpenAiChunkStream<'a>, BackendFailure>> {
        Box::pin(async move {
            request.stream = true;
            let response = self.send(request, &api_key).await?;

            let stream = try_stream! {
                let mut events = Box::pin(response_events(response));
                let mut completed = false;

                while let Some(event) = events.next().await {
                    let event = event?;
                    let payload = event.data.trim();
                    if payload == "[DONE]" {
                        completed = true;
                        break;
                    }

                    let parsed = parse_stream_payload(payload)?;
                    if let Some(choice) = parsed.choices.into_iter().next() {
                        if let Some(content) = choice.delta.content {
                            if !content.is_empty() {
                                yield OpenAiStreamChunk::TextDelta(content);
                            }
                        }

                        if choice.finish_reason.is_some() {
                            completed = true;
                            yield OpenAiStreamChunk::Finished {
                                finish_reason: choice.finish_reason,
                            };
                        }
                    }
                }

                ensure_completed(completed)?;
            };

            Ok(Box::pin(stream) as OpenAiChunkStream<'a>)
        })
    }
}
