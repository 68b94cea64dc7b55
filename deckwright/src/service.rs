#![doc = "HTTP clients for the completion and template rendering services, implementing the core service traits."]
//
//! # Service clients (CLI <-> Core)
//!
//! - [`HttpCompletionClient`] speaks the OpenAI-compatible chat completion
//!   protocol with a bearer key and returns `choices[0].message.content`.
//! - [`HttpRenderService`] posts an export request and returns the file bytes.
//!
//! Both carry a client-level timeout; the core additionally bounds each call.
//! Non-success statuses are surfaced with the status code and response body.

use async_trait::async_trait;
use deckwright_core::contract::{ChatRequest, CompletionClient, ExportRequest, RenderService};
use deckwright_core::error::{CompletionError, RenderError};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Pulls the first choice's text out of a chat completion body.
pub fn completion_text(body: &str) -> Result<String, CompletionError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| CompletionError::Decode(e.to_string()))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or(CompletionError::EmptyResponse)
}

fn build_http(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(timeout).build()
}

pub struct HttpCompletionClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
}

impl HttpCompletionClient {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let url = url.into();
        tracing::info!(url = %url, timeout_secs = timeout.as_secs(), "Initialized completion client");
        Ok(Self {
            http: build_http(timeout)?,
            url,
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, request: ChatRequest) -> Result<String, CompletionError> {
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            max_tokens = request.max_tokens,
            "Sending chat completion request"
        );
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, url = %self.url, "Completion request failed");
                if e.is_timeout() {
                    CompletionError::Timeout
                } else {
                    CompletionError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;
        if !status.is_success() {
            tracing::error!(status = status.as_u16(), body = %body, "Completion service returned an error");
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }
        completion_text(&body)
    }
}

pub struct HttpRenderService {
    http: reqwest::Client,
    url: String,
}

impl HttpRenderService {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let url = url.into();
        tracing::info!(url = %url, timeout_secs = timeout.as_secs(), "Initialized render client");
        Ok(Self {
            http: build_http(timeout)?,
            url,
        })
    }
}

#[async_trait]
impl RenderService for HttpRenderService {
    async fn render(&self, request: ExportRequest) -> Result<Vec<u8>, RenderError> {
        tracing::info!(
            template_id = %request.template_id,
            slides = request.deck.slides.len(),
            "Requesting template export"
        );
        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, url = %self.url, "Render request failed");
                if e.is_timeout() {
                    RenderError::Timeout
                } else {
                    RenderError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %body, "Render service returned an error");
            return Err(RenderError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RenderError::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
