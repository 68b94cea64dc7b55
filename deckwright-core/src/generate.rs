//! Whole-deck generation: uploaded files in, normalized [`Deck`] out.
//!
//! The pipeline runs in fixed phases and reports progress after each one:
//!   - extract every uploaded file ([`crate::ingest`])
//!   - build the prompt from the extracted content and the template's layout map
//!     ([`crate::prompt`])
//!   - call the completion service once, bounded by the configured timeout
//!   - decode and normalize the reply ([`crate::normalize`])
//!
//! # Error Handling
//! Per-file read errors never abort the run. Service failures, timeouts and an
//! empty reply are returned as [`GenerationError`]; a reply that is not usable
//! JSON still yields a minimal deck.

use tokio::time::timeout;
use tracing::{debug, error, info};

use crate::config::GenerationSettings;
use crate::contract::CompletionClient;
use crate::error::GenerationError;
use crate::ingest::{extract_files, ExtractedContent, UploadedFile};
use crate::model::{Deck, TemplateDescriptor};
use crate::normalize::{build_deck, parse_reply};
use crate::prompt::generation_request;
use crate::template::{TemplateLayout, TemplateLayoutMap};

/// Forwards progress to a callback, never letting the percentage go backwards.
pub struct ProgressTracker<F>
where
    F: FnMut(u8, &str),
{
    last: u8,
    callback: F,
}

impl<F> ProgressTracker<F>
where
    F: FnMut(u8, &str),
{
    pub fn new(callback: F) -> Self {
        Self { last: 0, callback }
    }

    pub fn report(&mut self, percent: u8, message: &str) {
        let percent = percent.clamp(self.last, 100);
        self.last = percent;
        (self.callback)(percent, message);
    }

    pub fn last(&self) -> u8 {
        self.last
    }
}

/// Percentage reported before reading file `index` of `total`; spans 10 to 30.
fn extraction_percent(index: usize, total: usize) -> u8 {
    if total == 0 {
        return 10;
    }
    (10 + (20 * index) / total) as u8
}

pub struct DeckGenerator<C> {
    client: C,
    layouts: TemplateLayoutMap,
    settings: GenerationSettings,
}

impl<C> DeckGenerator<C>
where
    C: CompletionClient,
{
    pub fn new(client: C, layouts: TemplateLayoutMap, settings: GenerationSettings) -> Self {
        Self {
            client,
            layouts,
            settings,
        }
    }

    pub fn layouts(&self) -> &TemplateLayoutMap {
        &self.layouts
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Runs the whole pipeline, reporting `(percent, message)` along the way.
    pub async fn generate<F>(
        &self,
        files: &[UploadedFile],
        template: Option<&TemplateDescriptor>,
        progress: F,
    ) -> Result<Deck, GenerationError>
    where
        F: FnMut(u8, &str),
    {
        let mut progress = ProgressTracker::new(progress);
        info!(
            files = files.len(),
            template = template.map(|t| t.id.as_str()).unwrap_or("none"),
            "[GENERATE] Starting deck generation"
        );
        progress.report(5, "Starting generation...");

        progress.report(10, "Extracting content from files...");
        let content = extract_files(files, |index, total, message| {
            progress.report(extraction_percent(index, total), message)
        });

        progress.report(30, "Analyzing content...");
        let layout = self.layouts.layout_for(template.map(|t| t.id.as_str()));
        let request = generation_request(&content, template, &layout, &self.settings);
        debug!(
            model = %request.model,
            prompt_chars = request.messages.iter().map(|m| m.content.len()).sum::<usize>(),
            images = content.images.len(),
            "[GENERATE] Built generation request"
        );

        progress.report(50, "Generating slides with AI...");
        let reply = match timeout(self.settings.timeout(), self.client.complete(request)).await {
            Err(_) => {
                error!(
                    timeout_secs = self.settings.timeout_secs,
                    "[GENERATE][ERROR] Generation request timed out"
                );
                return Err(GenerationError::Timeout);
            }
            Ok(Err(e)) => {
                error!(error = %e, "[GENERATE][ERROR] Generation request failed");
                return Err(e.into());
            }
            Ok(Ok(text)) => text,
        };
        if reply.trim().is_empty() {
            error!("[GENERATE][ERROR] Generation service returned an empty reply");
            return Err(GenerationError::EmptyResponse);
        }

        progress.report(80, "Processing response...");
        debug!(reply_chars = reply.len(), "[GENERATE] Received reply");

        progress.report(90, "Normalizing slides...");
        let deck = normalize(&reply, template, &layout, &content)?;

        progress.report(100, "Complete!");
        info!(
            deck_id = %deck.id,
            title = %deck.title,
            slides = deck.slides.len(),
            "[GENERATE] Deck generated"
        );
        Ok(deck)
    }
}

fn normalize(
    reply: &str,
    template: Option<&TemplateDescriptor>,
    layout: &TemplateLayout,
    content: &ExtractedContent,
) -> Result<Deck, GenerationError> {
    let parsed = parse_reply(reply);
    debug!(tier = ?parsed.tier, slides = parsed.reply.slides.len(), "[GENERATE] Decoded reply");
    build_deck(parsed.reply, template, layout, content, &mut rand::rng())
}
