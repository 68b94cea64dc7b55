//! Single-field regeneration: rewrite one title or bullet, or draft a new bullet.
//!
//! Every call returns a usable value. Service errors, timeouts and blank
//! completions all resolve to the value the caller already had.

use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::RegenerationSettings;
use crate::contract::{ChatMessage, ChatRequest, CompletionClient};
use crate::model::Slide;

pub const NEW_BULLET_FALLBACK: &str = "New bullet point";

/// Context used for a title when the slide has no bullets yet.
pub const GENERIC_TITLE_CONTEXT: &str = "Bell Canada presentation slide";

const TITLE_SYSTEM: &str =
    "You are a professional presentation writer for Bell Canada. Create clear, professional slide titles.";
const BULLET_SYSTEM: &str = "You are a professional presentation writer for Bell Canada. Improve bullet points to be concise and professional.";
const NEW_BULLET_SYSTEM: &str = "You are a professional presentation writer for Bell Canada. Create relevant, professional bullet points.";

/// Context for rewriting a slide title: its bullets joined by spaces.
pub fn title_context(slide: &Slide) -> String {
    let joined = slide.visible_bullets().collect::<Vec<_>>().join(" ");
    if joined.is_empty() {
        GENERIC_TITLE_CONTEXT.to_string()
    } else {
        joined
    }
}

/// Context for rewriting bullet `index`: the title plus every other bullet.
pub fn bullet_context(slide: &Slide, index: usize) -> String {
    let others = slide
        .bullets
        .iter()
        .enumerate()
        .filter(|(i, b)| *i != index && !b.trim().is_empty())
        .map(|(_, b)| b.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    format!("{}. Other points: {}", slide.title, others)
}

pub struct Regenerator<C> {
    client: C,
    settings: RegenerationSettings,
}

impl<C> Regenerator<C>
where
    C: CompletionClient,
{
    pub fn new(client: C, settings: RegenerationSettings) -> Self {
        Self { client, settings }
    }

    pub async fn regenerate_title(&self, context: &str, current_title: &str) -> String {
        let prompt = format!(
            "You are helping to refine a slide title for a Bell Canada presentation.

Context: {context}

Current title: {current_title}

Please provide an improved version of this title that is:
- Clear and professional
- Concise (under 10 words)
- Suitable for a Bell Canada enterprise presentation
- Based on the context provided

Return only the improved title text, nothing else."
        );
        let request = self.request(TITLE_SYSTEM, prompt, self.settings.title_max_tokens);
        self.complete_or(request, current_title, "title").await
    }

    pub async fn regenerate_bullet(&self, context: &str, current_bullet: &str) -> String {
        let prompt = format!(
            "You are helping to refine a bullet point for a Bell Canada presentation.

Context: {context}

Current bullet point: {current_bullet}

Please provide an improved version of this bullet point that is:
- More concise and professional
- Action-oriented
- Suitable for a Bell Canada enterprise presentation
- Based on the context provided

Return only the improved bullet point text, nothing else."
        );
        let request = self.request(BULLET_SYSTEM, prompt, self.settings.bullet_max_tokens);
        self.complete_or(request, current_bullet, "bullet").await
    }

    /// Drafts a bullet that complements `existing_bullets`.
    pub async fn generate_new_bullet(&self, context: &str, existing_bullets: &[String]) -> String {
        let existing = existing_bullets.join("\n");
        let prompt = format!(
            "You are helping to create a new bullet point for a Bell Canada presentation slide.

Context: {context}

Existing bullet points on this slide:
{existing}

Please create a new, relevant bullet point that:
- Complements the existing bullet points
- Is concise and professional
- Is action-oriented
- Is suitable for a Bell Canada enterprise presentation
- Adds value to the slide without being redundant

Return only the new bullet point text, nothing else."
        );
        let request = self.request(NEW_BULLET_SYSTEM, prompt, self.settings.bullet_max_tokens);
        self.complete_or(request, NEW_BULLET_FALLBACK, "new bullet")
            .await
    }

    fn request(&self, system: &str, prompt: String, max_tokens: u32) -> ChatRequest {
        ChatRequest {
            model: self.settings.model.clone(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(prompt)],
            temperature: self.settings.temperature,
            max_tokens,
            response_format: None,
        }
    }

    async fn complete_or(&self, request: ChatRequest, unchanged: &str, field: &str) -> String {
        match timeout(self.settings.timeout(), self.client.complete(request)).await {
            Ok(Ok(text)) => {
                let text = text.trim();
                if text.is_empty() {
                    warn!(field, "Regeneration returned nothing, keeping current value");
                    unchanged.to_string()
                } else {
                    debug!(field, chars = text.len(), "Regenerated field");
                    text.to_string()
                }
            }
            Ok(Err(e)) => {
                warn!(field, error = %e, "Regeneration failed, keeping current value");
                unchanged.to_string()
            }
            Err(_) => {
                warn!(
                    field,
                    timeout_secs = self.settings.timeout_secs,
                    "Regeneration timed out, keeping current value"
                );
                unchanged.to_string()
            }
        }
    }
}
