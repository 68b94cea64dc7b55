//! Deck data model shared by generation, editing and export.
//!
//! Field names follow the wire format the rendering service and the session
//! file expect, so the structs serialize without a separate DTO layer.

use serde::{Deserialize, Serialize};

/// The full presentation document being edited: title plus ordered slides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deck {
    pub id: String,
    pub title: String,
    pub template: Option<TemplateDescriptor>,
    pub slides: Vec<Slide>,
    #[serde(default)]
    pub images: Vec<ExtractedImage>,
}

impl Deck {
    /// Creates a deck with a fresh random identifier.
    pub fn new(title: impl Into<String>, template: Option<TemplateDescriptor>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            template,
            slides: Vec::new(),
            images: Vec::new(),
        }
    }

    /// Next id that is not used by any slide in the deck.
    pub fn next_slide_id(&self) -> u32 {
        self.slides.iter().map(|s| s.id).max().unwrap_or(0) + 1
    }
}

/// Side of a content slide the image is placed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImagePosition {
    Left,
    #[default]
    Right,
}

/// Provenance annotation attached to a generated slide.
///
/// The page number is synthetic: it is produced for display parity and does
/// not point at a verified location in any source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEvidence {
    pub page: u32,
    pub text: String,
}

/// One page of the deck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    pub id: u32,
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub bullets: Vec<String>,
    pub confidence: u8,
    #[serde(default)]
    pub layout_index: u32,
    #[serde(default)]
    pub title_placeholder_idx: u32,
    #[serde(default = "default_body_placeholder")]
    pub body_placeholder_idx: u32,
    #[serde(default = "default_subtitle_placeholder")]
    pub subtitle_placeholder_idx: u32,
    #[serde(default)]
    pub image_ref: Option<String>,
    #[serde(default)]
    pub image_data: Option<String>,
    #[serde(default)]
    pub image_position: ImagePosition,
    #[serde(rename = "sourceEvidence", default)]
    pub source_evidence: Option<SourceEvidence>,
}

fn default_body_placeholder() -> u32 {
    1
}

fn default_subtitle_placeholder() -> u32 {
    4
}

impl Slide {
    /// A blank slide with default template bindings.
    pub fn new(id: u32, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            subtitle: None,
            bullets: Vec::new(),
            confidence: 0,
            layout_index: 1,
            title_placeholder_idx: 0,
            body_placeholder_idx: default_body_placeholder(),
            subtitle_placeholder_idx: default_subtitle_placeholder(),
            image_ref: None,
            image_data: None,
            image_position: ImagePosition::Right,
            source_evidence: None,
        }
    }

    /// Bullets that carry text; blank entries left behind by editing are skipped.
    pub fn visible_bullets(&self) -> impl Iterator<Item = &str> {
        self.bullets
            .iter()
            .map(|b| b.as_str())
            .filter(|b| !b.trim().is_empty())
    }

    pub fn has_image(&self) -> bool {
        self.image_data.is_some()
    }
}

/// Partial update merged into a slide by [`crate::store::DeckStore::update_slide`].
///
/// There is no slide id: edits never change slide identity.
/// Nullable fields use `Option<Option<_>>` so a patch can clear them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlidePatch {
    pub title: Option<String>,
    pub subtitle: Option<Option<String>>,
    pub bullets: Option<Vec<String>>,
    pub confidence: Option<u8>,
    pub layout_index: Option<u32>,
    pub image_ref: Option<Option<String>>,
    pub image_data: Option<Option<String>>,
    pub image_position: Option<ImagePosition>,
}

impl SlidePatch {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn subtitle(mut self, subtitle: Option<String>) -> Self {
        self.subtitle = Some(subtitle);
        self
    }

    pub fn bullets(mut self, bullets: Vec<String>) -> Self {
        self.bullets = Some(bullets);
        self
    }

    pub fn confidence(mut self, confidence: u8) -> Self {
        self.confidence = Some(confidence.min(100));
        self
    }

    pub fn layout_index(mut self, layout_index: u32) -> Self {
        self.layout_index = Some(layout_index);
        self
    }

    pub fn image_position(mut self, position: ImagePosition) -> Self {
        self.image_position = Some(position);
        self
    }

    /// Detaches any image from the slide.
    pub fn remove_image(mut self) -> Self {
        self.image_ref = Some(None);
        self.image_data = Some(None);
        self
    }

    pub(crate) fn apply_to(self, slide: &mut Slide) {
        if let Some(title) = self.title {
            slide.title = title;
        }
        if let Some(subtitle) = self.subtitle {
            slide.subtitle = subtitle;
        }
        if let Some(bullets) = self.bullets {
            slide.bullets = bullets;
        }
        if let Some(confidence) = self.confidence {
            slide.confidence = confidence;
        }
        if let Some(layout_index) = self.layout_index {
            slide.layout_index = layout_index;
        }
        if let Some(image_ref) = self.image_ref {
            slide.image_ref = image_ref;
        }
        if let Some(image_data) = self.image_data {
            slide.image_data = image_data;
        }
        if let Some(position) = self.image_position {
            slide.image_position = position;
        }
    }
}

/// A named style/layout descriptor selected before generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDescriptor {
    pub id: String,
    pub name: String,
    pub category: String,
    /// Target slide count.
    pub slides: u32,
    #[serde(rename = "templateFile")]
    pub template_file: String,
}

/// An image pulled out of an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedImage {
    pub name: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    /// Base64 data URL (`data:{mime};base64,...`).
    pub data: String,
}

/// An immutable saved snapshot of the deck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub id: String,
    pub timestamp: String,
    pub name: String,
    pub deck: Deck,
}

impl Version {
    /// Snapshots `deck` under `name`. Ids are UUID v7 so they sort by creation time.
    pub fn snapshot(name: impl Into<String>, deck: &Deck) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            name: name.into(),
            deck: deck.clone(),
        }
    }
}
