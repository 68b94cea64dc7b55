//! Parsing and normalization of the generation service's reply.
//!
//! The reply is decoded in explicit tiers: the raw text, the body of a
//! markdown code fence, then the widest `{...}` span. A tier only counts when
//! the JSON also fits [`DeckReply`]. When every tier fails the pipeline still
//! produces a one-slide deck, because the service did answer.

use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::error::GenerationError;
use crate::ingest::ExtractedContent;
use crate::model::{Deck, ExtractedImage, ImagePosition, Slide, SourceEvidence, TemplateDescriptor};
use crate::template::TemplateLayout;

pub const DEFAULT_DECK_TITLE: &str = "Generated Presentation";
pub const DEFAULT_CONFIDENCE: u8 = 85;
pub const FALLBACK_SLIDE_TITLE: &str = "Overview";
pub const FALLBACK_CONFIDENCE: u8 = 70;
pub const FALLBACK_BULLETS: [&str; 2] = [
    "Content extracted from source materials",
    "Please review and refine",
];

/// Highest synthetic evidence page number.
const EVIDENCE_MAX_PAGE: u32 = 20;

/// Reply schema: `{"title": ..., "slides": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DeckReply {
    #[serde(deserialize_with = "lenient_string")]
    pub title: Option<String>,
    pub slides: Vec<SlideReply>,
}

/// One slide as the service returned it. Numeric fields stay loosely typed
/// until normalization decides whether they are usable.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SlideReply {
    #[serde(deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub subtitle: Option<String>,
    #[serde(deserialize_with = "lenient_bullets")]
    pub bullets: Vec<String>,
    pub confidence: Option<Value>,
    pub layout_index: Option<Value>,
    pub title_placeholder_idx: Option<Value>,
    pub body_placeholder_idx: Option<Value>,
    pub subtitle_placeholder_idx: Option<Value>,
    #[serde(deserialize_with = "lenient_string")]
    pub image_ref: Option<String>,
}

/// Accepts any JSON for a text field: strings are kept, numbers and booleans
/// are written out, everything else is treated as absent.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// Accepts any JSON for `bullets`: arrays keep their string and number
/// entries, everything else becomes an empty list.
fn lenient_bullets<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

/// Which decoding tier produced the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseTier {
    Direct,
    Fenced,
    Extracted,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReply {
    pub reply: DeckReply,
    pub tier: ParseTier,
}

fn fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").expect("valid regex"))
}

fn try_decode(candidate: &str) -> Option<DeckReply> {
    match serde_json::from_str::<DeckReply>(candidate.trim()) {
        Ok(reply) => Some(reply),
        Err(e) => {
            debug!(error = %e, "Reply candidate did not match deck schema");
            None
        }
    }
}

/// Decodes the completion text, never failing.
pub fn parse_reply(text: &str) -> ParsedReply {
    if let Some(reply) = try_decode(text) {
        return ParsedReply {
            reply,
            tier: ParseTier::Direct,
        };
    }

    if let Some(reply) = fence()
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| try_decode(m.as_str()))
    {
        info!("Recovered deck JSON from a code fence");
        return ParsedReply {
            reply,
            tier: ParseTier::Fenced,
        };
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            if let Some(reply) = try_decode(&text[start..=end]) {
                info!("Recovered deck JSON from surrounding text");
                return ParsedReply {
                    reply,
                    tier: ParseTier::Extracted,
                };
            }
        }
    }

    warn!(
        preview = %text.chars().take(200).collect::<String>(),
        "Reply was not usable deck JSON, substituting fallback deck"
    );
    ParsedReply {
        reply: DeckReply::default(),
        tier: ParseTier::Fallback,
    }
}

fn fallback_slide() -> SlideReply {
    SlideReply {
        title: Some(FALLBACK_SLIDE_TITLE.to_string()),
        bullets: FALLBACK_BULLETS.iter().map(|b| b.to_string()).collect(),
        confidence: Some(Value::from(FALLBACK_CONFIDENCE)),
        ..SlideReply::default()
    }
}

fn as_index(value: Option<&Value>) -> Option<u32> {
    let value = value?;
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok();
    }
    value
        .as_f64()
        .filter(|f| f.is_finite() && *f >= 0.0 && *f <= u32::MAX as f64)
        .map(|f| f.floor() as u32)
}

fn as_confidence(value: Option<&Value>) -> u8 {
    value
        .and_then(Value::as_f64)
        .filter(|f| f.is_finite())
        .map(|f| f.round().clamp(0.0, 100.0) as u8)
        .unwrap_or(DEFAULT_CONFIDENCE)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null"))
}

fn stem(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

/// Finds the image a slide's `image_ref` points at.
///
/// Tiers, first hit wins: exact name (or name without extension),
/// case-insensitive name, then case-insensitive substring in either direction.
pub fn resolve_image<'a>(
    reference: &str,
    images: &'a [ExtractedImage],
) -> Option<(usize, &'a ExtractedImage)> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }
    if let Some(hit) = find_image(images, |key| key == reference) {
        return Some(hit);
    }
    let lower = reference.to_lowercase();
    if let Some(hit) = find_image(images, |key| key.to_lowercase() == lower) {
        return Some(hit);
    }
    find_image(images, |key| {
        let key = key.to_lowercase();
        !key.is_empty() && (key.contains(&lower) || lower.contains(&key))
    })
}

fn find_image<'a>(
    images: &'a [ExtractedImage],
    matches: impl Fn(&str) -> bool,
) -> Option<(usize, &'a ExtractedImage)> {
    images
        .iter()
        .enumerate()
        .find(|(_, img)| matches(img.name.as_str()) || matches(stem(&img.name)))
}

fn is_valid(slide: &Slide, index: usize) -> bool {
    let has_title = !slide.title.trim().is_empty();
    if index == 0 {
        has_title
    } else {
        has_title && slide.visible_bullets().next().is_some()
    }
}

fn evidence_text(content: &ExtractedContent) -> String {
    let names = content.file_names();
    if names.is_empty() {
        "Content extracted from source materials: uploaded files".to_string()
    } else {
        format!(
            "Content extracted from source materials: {}",
            names.join(", ")
        )
    }
}

/// Turns a decoded reply into a canonical deck.
///
/// Assigns ids, fills defaults from the layout map, resolves and distributes
/// images, then drops invalid slides.
pub fn build_deck<R: Rng>(
    reply: DeckReply,
    template: Option<&TemplateDescriptor>,
    layout: &TemplateLayout,
    content: &ExtractedContent,
    rng: &mut R,
) -> Result<Deck, GenerationError> {
    let slide_replies = if reply.slides.is_empty() {
        info!("Reply contained no slides, using fallback slide");
        vec![fallback_slide()]
    } else {
        reply.slides
    };

    let evidence = evidence_text(content);
    let images = &content.images;
    let mut used_images: HashSet<usize> = HashSet::new();

    let mut slides: Vec<Slide> = slide_replies
        .into_iter()
        .enumerate()
        .map(|(index, raw)| {
            let is_title = index == 0;
            let image_ref = non_empty(raw.image_ref);
            let image_data = image_ref
                .as_deref()
                .and_then(|r| resolve_image(r, images))
                .map(|(i, img)| {
                    used_images.insert(i);
                    img.data.clone()
                });
            Slide {
                id: index as u32 + 1,
                title: non_empty(raw.title).unwrap_or_else(|| format!("Slide {}", index + 1)),
                subtitle: non_empty(raw.subtitle),
                bullets: raw
                    .bullets
                    .into_iter()
                    .map(|b| b.trim().to_string())
                    .filter(|b| !b.is_empty())
                    .collect(),
                confidence: as_confidence(raw.confidence.as_ref()),
                layout_index: as_index(raw.layout_index.as_ref()).unwrap_or(if is_title {
                    layout.title_layout_index
                } else {
                    layout.content_layout_index
                }),
                title_placeholder_idx: as_index(raw.title_placeholder_idx.as_ref())
                    .unwrap_or(layout.title_placeholder_idx),
                body_placeholder_idx: as_index(raw.body_placeholder_idx.as_ref())
                    .unwrap_or(layout.body_placeholder_idx),
                subtitle_placeholder_idx: as_index(raw.subtitle_placeholder_idx.as_ref())
                    .unwrap_or(layout.subtitle_placeholder_idx),
                image_ref,
                image_data,
                image_position: ImagePosition::Right,
                source_evidence: Some(SourceEvidence {
                    page: rng.random_range(1..=EVIDENCE_MAX_PAGE),
                    text: evidence.clone(),
                }),
            }
        })
        .collect();

    distribute_unreferenced_images(&mut slides, images, &used_images);

    let before = slides.len();
    let slides: Vec<Slide> = slides
        .into_iter()
        .enumerate()
        .filter(|(index, slide)| is_valid(slide, *index))
        .map(|(_, slide)| slide)
        .collect();
    if before != slides.len() {
        info!(dropped = before - slides.len(), "Dropped invalid slides");
    }

    if slides.is_empty() {
        return Err(GenerationError::NoValidSlides);
    }

    let mut deck = Deck::new(
        non_empty(reply.title).unwrap_or_else(|| DEFAULT_DECK_TITLE.to_string()),
        template.cloned(),
    );
    deck.slides = slides;
    deck.images = images.clone();
    Ok(deck)
}

/// Hands images no slide asked for to content slides without an image, in order.
fn distribute_unreferenced_images(
    slides: &mut [Slide],
    images: &[ExtractedImage],
    used: &HashSet<usize>,
) {
    let unassigned = images
        .iter()
        .enumerate()
        .filter(|(i, _)| !used.contains(i))
        .map(|(_, img)| img);
    let candidates: Vec<usize> = slides
        .iter()
        .enumerate()
        .filter(|(i, s)| *i > 0 && !s.has_image() && is_valid(s, *i))
        .map(|(i, _)| i)
        .collect();

    for (slide_index, image) in candidates.into_iter().zip(unassigned) {
        debug!(slide = slide_index, image = %image.name, "Assigning unreferenced image");
        let slide = &mut slides[slide_index];
        slide.image_ref = Some(image.name.clone());
        slide.image_data = Some(image.data.clone());
    }
}
