//! # contract: service boundaries of the deck pipeline
//!
//! The pipeline talks to two external services, both behind async traits so
//! the core stays transport-agnostic and testable:
//!
//! - [`CompletionClient`]: an OpenAI-compatible chat completion endpoint, used
//!   for whole-deck generation and single-field regeneration.
//! - [`RenderService`]: the template-aware presentation renderer used by the
//!   primary export path.
//!
//! Both traits are annotated for `mockall`, so `MockCompletionClient` and
//! `MockRenderService` are available to tests (and to downstream crates with
//! the `test-export-mocks` feature).

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::{CompletionError, RenderError};
use crate::model::Deck;

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Requested shape of the completion (`{"type": "json_object"}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

impl ResponseFormat {
    pub fn json_object() -> Self {
        Self {
            kind: "json_object".to_string(),
        }
    }
}

/// Body of a chat completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

/// Body of a template export request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    pub template_id: String,
    pub internal_use_only: bool,
    pub deck: Deck,
}

/// Chat completion endpoint.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Sends `request` and returns the text of the first completion choice.
    ///
    /// Implementors map non-success statuses to [`CompletionError::Status`]
    /// with the response body, and a missing/empty choice to
    /// [`CompletionError::EmptyResponse`].
    async fn complete(&self, request: ChatRequest) -> Result<String, CompletionError>;
}

/// Template-aware presentation renderer.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RenderService: Send + Sync {
    /// Renders the deck into a presentation file and returns its bytes.
    async fn render(&self, request: ExportRequest) -> Result<Vec<u8>, RenderError>;
}
