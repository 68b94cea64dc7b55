//! Export adapter: turns the current deck into a downloadable file.
//!
//! Two paths, tried in order:
//!   - the template service ([`RenderService`]), for templates present in the
//!     layout map, producing a PPTX
//!   - local rendering to PDF ([`crate::render`]) whenever the template is
//!     unknown or the service fails or times out
//!
//! There is no retry. [`ExportError`] is returned only when both paths fail.

use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::config::ExportSettings;
use crate::contract::{ExportRequest, RenderService};
use crate::error::{ExportError, RenderError};
use crate::model::Deck;
use crate::render::render_pdf;
use crate::store::{DeckStore, DEFAULT_TEMPLATE_THEME};
use crate::template::TemplateLayoutMap;

/// Base name used when the deck title sanitizes to nothing.
pub const DEFAULT_FILE_STEM: &str = "Bell_Presentation";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Pptx,
    Pdf,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Pptx => "pptx",
            ExportFormat::Pdf => "pdf",
        }
    }
}

/// A rendered presentation ready to be written out.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub format: ExportFormat,
    /// Why the template path was skipped or failed, when the local path was used.
    pub fallback_reason: Option<String>,
}

impl ExportedFile {
    /// Writes the file into `dir`, creating it if needed, and returns the full path.
    pub fn save_to<P: AsRef<Path>>(&self, dir: P) -> std::io::Result<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.filename);
        std::fs::write(&path, &self.bytes)?;
        info!(path = %path.display(), bytes = self.bytes.len(), "Wrote exported file");
        Ok(path)
    }
}

/// Replaces characters that are not allowed in file names.
pub fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if cleaned.trim_matches(|c| c == '_' || c == '.').is_empty() {
        DEFAULT_FILE_STEM.to_string()
    } else {
        cleaned
    }
}

/// `{title}_{YYYY-MM-DD}.{ext}`
pub fn export_filename(title: &str, date: NaiveDate, format: ExportFormat) -> String {
    format!(
        "{}_{}.{}",
        sanitize_title(title),
        date.format("%Y-%m-%d"),
        format.extension()
    )
}

enum PrimaryOutcome {
    Skipped(String),
    Failed(String),
    TimedOut,
}

pub struct Exporter<R> {
    renderer: R,
    layouts: TemplateLayoutMap,
    settings: ExportSettings,
}

impl<R> Exporter<R>
where
    R: RenderService,
{
    pub fn new(renderer: R, layouts: TemplateLayoutMap, settings: ExportSettings) -> Self {
        Self {
            renderer,
            layouts,
            settings,
        }
    }

    /// Exports the store's current deck with its confidentiality flag and selected template.
    pub async fn export_store(&self, store: &DeckStore) -> Result<ExportedFile, ExportError> {
        let deck = store.deck().ok_or(ExportError::EmptyDeck)?;
        let template_id = store.selected_template().map(|t| t.id.as_str());
        self.export(deck, store.internal_use_only(), template_id)
            .await
    }

    /// Exports `deck`, dated today (UTC).
    pub async fn export(
        &self,
        deck: &Deck,
        internal_use_only: bool,
        template_id: Option<&str>,
    ) -> Result<ExportedFile, ExportError> {
        self.export_dated(
            deck,
            internal_use_only,
            template_id,
            chrono::Utc::now().date_naive(),
        )
        .await
    }

    pub async fn export_dated(
        &self,
        deck: &Deck,
        internal_use_only: bool,
        template_id: Option<&str>,
        date: NaiveDate,
    ) -> Result<ExportedFile, ExportError> {
        if deck.slides.is_empty() {
            return Err(ExportError::EmptyDeck);
        }
        let template_id = template_id.unwrap_or(DEFAULT_TEMPLATE_THEME);
        info!(
            deck_id = %deck.id,
            template_id,
            internal_use_only,
            slides = deck.slides.len(),
            "[EXPORT] Starting export"
        );

        let outcome = if self.layouts.contains(template_id) {
            let request = ExportRequest {
                template_id: template_id.to_string(),
                internal_use_only,
                deck: deck.clone(),
            };
            match timeout(self.settings.timeout(), self.renderer.render(request)).await {
                Ok(Ok(bytes)) => {
                    let filename = export_filename(&deck.title, date, ExportFormat::Pptx);
                    info!(filename = %filename, bytes = bytes.len(), "[EXPORT] Template export succeeded");
                    return Ok(ExportedFile {
                        filename,
                        bytes,
                        format: ExportFormat::Pptx,
                        fallback_reason: None,
                    });
                }
                Ok(Err(RenderError::Timeout)) | Err(_) => PrimaryOutcome::TimedOut,
                Ok(Err(e)) => PrimaryOutcome::Failed(e.to_string()),
            }
        } else {
            PrimaryOutcome::Skipped(format!("no layout map entry for template '{template_id}'"))
        };

        let reason = match &outcome {
            PrimaryOutcome::Skipped(reason) => {
                info!(reason = %reason, "[EXPORT] Using local export");
                reason.clone()
            }
            PrimaryOutcome::Failed(reason) => {
                warn!(error = %reason, "[EXPORT] Template export failed, falling back to local export");
                reason.clone()
            }
            PrimaryOutcome::TimedOut => {
                warn!(
                    timeout_secs = self.settings.timeout_secs,
                    "[EXPORT] Template export timed out, falling back to local export"
                );
                "timeout".to_string()
            }
        };

        let watermark = internal_use_only.then_some(self.settings.watermark.as_str());
        match render_pdf(deck, watermark) {
            Ok(bytes) => {
                let filename = export_filename(&deck.title, date, ExportFormat::Pdf);
                info!(filename = %filename, bytes = bytes.len(), "[EXPORT] Local export succeeded");
                Ok(ExportedFile {
                    filename,
                    bytes,
                    format: ExportFormat::Pdf,
                    fallback_reason: Some(reason),
                })
            }
            Err(e) => {
                error!(error = %e, "[EXPORT][ERROR] Local export failed");
                Err(match outcome {
                    PrimaryOutcome::TimedOut => ExportError::Timeout {
                        fallback: e.to_string(),
                    },
                    PrimaryOutcome::Failed(primary) => ExportError::Failed {
                        primary: Some(primary),
                        fallback: e.to_string(),
                    },
                    PrimaryOutcome::Skipped(_) => ExportError::Failed {
                        primary: None,
                        fallback: e.to_string(),
                    },
                })
            }
        }
    }
}
