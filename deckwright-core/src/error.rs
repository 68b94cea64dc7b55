//! Error types for the deck pipeline.

use thiserror::Error;

/// Failure while reading one uploaded file. Always recovered by the ingestion
/// adapter into a placeholder content string.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("empty file")]
    Empty,
}

/// Failure reported by a [`crate::contract::CompletionClient`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompletionError {
    /// The request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("timeout")]
    Timeout,

    /// The response envelope carried no completion text.
    #[error("no response from the completion service")]
    EmptyResponse,

    /// The response body was not the expected JSON envelope.
    #[error("could not decode completion response: {0}")]
    Decode(String),
}

/// Failure of a full deck generation run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("generation service unreachable: {0}")]
    Transport(String),

    #[error("generation service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("timeout")]
    Timeout,

    #[error("no response from the generation service")]
    EmptyResponse,

    #[error("no valid slides")]
    NoValidSlides,
}

impl From<CompletionError> for GenerationError {
    fn from(e: CompletionError) -> Self {
        match e {
            CompletionError::Transport(msg) => GenerationError::Transport(msg),
            CompletionError::Status { status, body } => GenerationError::Status { status, body },
            CompletionError::Timeout => GenerationError::Timeout,
            CompletionError::EmptyResponse => GenerationError::EmptyResponse,
            CompletionError::Decode(msg) => GenerationError::Transport(msg),
        }
    }
}

/// Failure reported by a [`crate::contract::RenderService`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("render service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("timeout")]
    Timeout,
}

/// Failure of an export after every available path was tried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExportError {
    #[error("No deck to export")]
    EmptyDeck,

    /// The rendering service timed out and the local fallback failed too.
    #[error("timeout (local fallback also failed: {fallback})")]
    Timeout { fallback: String },

    #[error("export failed: {}", describe_failure(.primary, .fallback))]
    Failed {
        primary: Option<String>,
        fallback: String,
    },
}

fn describe_failure(primary: &Option<String>, fallback: &str) -> String {
    match primary {
        Some(p) => format!("template export: {p}; local export: {fallback}"),
        None => format!("local export: {fallback}"),
    }
}

/// A layout-map file that could not be read or parsed.
#[derive(Error, Debug)]
pub enum TemplateMapError {
    #[error("failed to read template map: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse template map: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A field edit that could not be started.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditError {
    #[error("no deck loaded")]
    NoDeck,

    #[error("no slide at index {0}")]
    NoSlide(usize),

    #[error("slide {slide_id} has no bullet at index {index}")]
    NoBullet { slide_id: u32, index: usize },

    #[error("{0} is already being regenerated")]
    InFlight(crate::workflow::FieldKey),
}
