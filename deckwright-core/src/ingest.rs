//! File ingestion: uploaded files to text and image payloads.
//!
//! Extraction is shallow. Binary office formats are scraped for printable
//! byte runs rather than parsed; the prompt builder applies the character budget.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::error::IngestionError;
use crate::model::ExtractedImage;

/// Per-file cap on scraped text from PDF and Word documents.
const MAX_SCRAPED_CHARS: usize = 50_000;

/// Where the bytes of an uploaded file live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum FileSource {
    Bytes(Vec<u8>),
    /// Read lazily at ingestion time.
    Path(PathBuf),
}

/// A file queued by the upload step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub name: String,
    pub mime_type: String,
    pub source: FileSource,
}

impl UploadedFile {
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            source: FileSource::Bytes(bytes.into()),
        }
    }

    /// A path-backed upload; the MIME type is derived from the extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            mime_type: mime_for_path(&path).to_string(),
            name,
            source: FileSource::Path(path),
        }
    }

    fn read(&self) -> Result<Vec<u8>, IngestionError> {
        let bytes = match &self.source {
            FileSource::Bytes(bytes) => bytes.clone(),
            FileSource::Path(path) => std::fs::read(path)?,
        };
        if bytes.is_empty() && self.kind() == FileKind::Image {
            return Err(IngestionError::Empty);
        }
        Ok(bytes)
    }

    fn has_extension(&self, exts: &[&str]) -> bool {
        let lower = self.name.to_lowercase();
        exts.iter().any(|ext| lower.ends_with(ext))
    }

    /// Classification used to pick an extraction strategy.
    pub fn kind(&self) -> FileKind {
        let mime = self.mime_type.to_lowercase();
        if mime.starts_with("image/") {
            FileKind::Image
        } else if mime.contains("pdf") || self.has_extension(&[".pdf"]) {
            FileKind::Pdf
        } else if mime.contains("sheet")
            || mime.contains("excel")
            || self.has_extension(&[".xlsx", ".xls"])
        {
            FileKind::Spreadsheet
        } else if mime.contains("word") || self.has_extension(&[".docx", ".doc"]) {
            FileKind::Document
        } else if mime.starts_with("text/") || self.has_extension(&[".txt", ".md", ".csv"]) {
            FileKind::Text
        } else if mime.contains("document") {
            FileKind::Document
        } else {
            FileKind::Other
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Image,
    Text,
    Pdf,
    Document,
    Spreadsheet,
    Other,
}

impl FileKind {
    pub fn label(self) -> &'static str {
        match self {
            FileKind::Image => "image",
            FileKind::Text => "text",
            FileKind::Pdf => "pdf",
            FileKind::Document => "document",
            FileKind::Spreadsheet => "spreadsheet",
            FileKind::Other => "other",
        }
    }
}

/// Text extracted from one file. `kind` is `"error"` when reading failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub name: String,
    pub kind: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedContent {
    pub texts: Vec<ExtractedText>,
    pub images: Vec<ExtractedImage>,
}

impl ExtractedContent {
    pub fn file_names(&self) -> Vec<&str> {
        self.texts.iter().map(|t| t.name.as_str()).collect()
    }
}

/// Extracts every file, reporting `(index, total, message)` before each one.
///
/// A file that cannot be read contributes an `Error reading file: ...`
/// placeholder; the batch always completes.
pub fn extract_files<F>(files: &[UploadedFile], mut on_file: F) -> ExtractedContent
where
    F: FnMut(usize, usize, &str),
{
    let mut content = ExtractedContent::default();
    let total = files.len();
    for (index, file) in files.iter().enumerate() {
        on_file(index, total, &format!("Reading {}...", file.name));
        match extract_file(file) {
            Ok((text, image)) => {
                debug!(file = %file.name, kind = %text.kind, chars = text.content.len(), "Extracted file");
                content.texts.push(text);
                if let Some(image) = image {
                    content.images.push(image);
                }
            }
            Err(e) => {
                warn!(file = %file.name, error = %e, "Failed to read uploaded file, using placeholder");
                content.texts.push(ExtractedText {
                    name: file.name.clone(),
                    kind: "error".to_string(),
                    content: format!("Error reading file: {e}"),
                });
            }
        }
    }
    info!(
        files = total,
        images = content.images.len(),
        "Finished extracting uploaded files"
    );
    content
}

fn extract_file(
    file: &UploadedFile,
) -> Result<(ExtractedText, Option<ExtractedImage>), IngestionError> {
    let kind = file.kind();
    let bytes = file.read()?;
    let mut image = None;
    let text = match kind {
        FileKind::Image => {
            image = Some(ExtractedImage {
                name: file.name.clone(),
                mime_type: file.mime_type.clone(),
                data: format!("data:{};base64,{}", file.mime_type, BASE64.encode(&bytes)),
            });
            format!(
                "[IMAGE: {}] - This is an image file that should be referenced in the presentation.",
                file.name
            )
        }
        FileKind::Text => String::from_utf8_lossy(&bytes).into_owned(),
        FileKind::Pdf => scrape_printable(&bytes, pdf_runs())
            .unwrap_or_else(|| "PDF content extracted".to_string()),
        FileKind::Document => scrape_printable(&bytes, document_runs())
            .unwrap_or_else(|| "Document content".to_string()),
        FileKind::Spreadsheet => format!(
            "Excel spreadsheet: {} ({:.1} KB)\n\nNote: Excel files require special parsing. Please provide a summary or export as CSV.",
            file.name,
            bytes.len() as f64 / 1024.0
        ),
        FileKind::Other => format!(
            "File: {} ({}) - Content could not be extracted directly.",
            file.name,
            if file.mime_type.is_empty() {
                "unknown type"
            } else {
                file.mime_type.as_str()
            }
        ),
    };
    Ok((
        ExtractedText {
            name: file.name.clone(),
            kind: kind.label().to_string(),
            content: text,
        },
        image,
    ))
}

fn pdf_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\x00-\x1F\x7F-\x{9F}]{20,}").expect("valid regex"))
}

fn document_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\x00-\x1F\x7F-\x{9F}]{10,}").expect("valid regex"))
}

/// Joins printable runs found in `bytes`, capped at [`MAX_SCRAPED_CHARS`].
fn scrape_printable(bytes: &[u8], runs: &Regex) -> Option<String> {
    let decoded = String::from_utf8_lossy(bytes);
    let joined = runs
        .find_iter(&decoded)
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    if joined.is_empty() {
        return None;
    }
    Some(joined.chars().take(MAX_SCRAPED_CHARS).collect())
}

/// MIME type for a file name, by extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        _ => "application/octet-stream",
    }
}
