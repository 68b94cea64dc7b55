//! Template catalogue, style guides and the per-template layout map.
//!
//! The layout map tells the generator which slide layouts and placeholder
//! indices a template offers, and tells the export adapter whether the
//! rendering service can handle a template at all. A default map is compiled
//! in; [`TemplateLayoutMap::load`] reads an override from disk.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use crate::error::TemplateMapError;
use crate::model::TemplateDescriptor;

const BUNDLED_TEMPLATE_MAPS: &str = include_str!("../resources/template-maps.json");

pub const DEFAULT_TITLE_LAYOUT_INDEX: u32 = 0;
pub const DEFAULT_CONTENT_LAYOUT_INDEX: u32 = 1;
pub const DEFAULT_TITLE_PLACEHOLDER_IDX: u32 = 0;
pub const DEFAULT_BODY_PLACEHOLDER_IDX: u32 = 1;
pub const DEFAULT_SUBTITLE_PLACEHOLDER_IDX: u32 = 4;

const DEFAULT_LAYOUT_DESCRIPTION: &str = "Title Slide, Content Slide";
const DEFAULT_STYLE_GUIDE: &str =
    "Professional enterprise style with clear titles and concise bullets.";

/// A placeholder on a slide layout, as recorded by the template scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderInfo {
    pub name: String,
    pub idx: u32,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub index: u32,
    pub name: String,
    #[serde(default)]
    pub placeholders: Vec<PlaceholderInfo>,
}

/// One entry of the layout map file. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateMapEntry {
    pub template_file: Option<String>,
    pub title_layout_index: Option<u32>,
    pub content_layout_index: Option<u32>,
    pub title_placeholder_idx: Option<u32>,
    pub body_placeholder_idx: Option<u32>,
    pub subtitle_placeholder_idx: Option<u32>,
    #[serde(default)]
    pub layouts: Vec<LayoutInfo>,
}

/// Layout bindings for one template with all defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateLayout {
    pub template_file: Option<String>,
    pub title_layout_index: u32,
    pub content_layout_index: u32,
    pub title_placeholder_idx: u32,
    pub body_placeholder_idx: u32,
    pub subtitle_placeholder_idx: u32,
    pub layouts: Vec<LayoutInfo>,
}

impl Default for TemplateLayout {
    fn default() -> Self {
        Self {
            template_file: None,
            title_layout_index: DEFAULT_TITLE_LAYOUT_INDEX,
            content_layout_index: DEFAULT_CONTENT_LAYOUT_INDEX,
            title_placeholder_idx: DEFAULT_TITLE_PLACEHOLDER_IDX,
            body_placeholder_idx: DEFAULT_BODY_PLACEHOLDER_IDX,
            subtitle_placeholder_idx: DEFAULT_SUBTITLE_PLACEHOLDER_IDX,
            layouts: Vec::new(),
        }
    }
}

impl TemplateLayout {
    /// `Layout 0: Title Slide, Layout 1: ...` for the prompt.
    pub fn layout_description(&self) -> String {
        if self.layouts.is_empty() {
            return DEFAULT_LAYOUT_DESCRIPTION.to_string();
        }
        self.layouts
            .iter()
            .map(|l| format!("Layout {}: {}", l.index, l.name))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl From<&TemplateMapEntry> for TemplateLayout {
    fn from(entry: &TemplateMapEntry) -> Self {
        Self {
            template_file: entry.template_file.clone(),
            title_layout_index: entry
                .title_layout_index
                .unwrap_or(DEFAULT_TITLE_LAYOUT_INDEX),
            content_layout_index: entry
                .content_layout_index
                .unwrap_or(DEFAULT_CONTENT_LAYOUT_INDEX),
            title_placeholder_idx: entry
                .title_placeholder_idx
                .unwrap_or(DEFAULT_TITLE_PLACEHOLDER_IDX),
            body_placeholder_idx: entry
                .body_placeholder_idx
                .unwrap_or(DEFAULT_BODY_PLACEHOLDER_IDX),
            subtitle_placeholder_idx: entry
                .subtitle_placeholder_idx
                .unwrap_or(DEFAULT_SUBTITLE_PLACEHOLDER_IDX),
            layouts: entry.layouts.clone(),
        }
    }
}

/// Static mapping from template id to its layout bindings. Loaded once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateLayoutMap {
    entries: HashMap<String, TemplateMapEntry>,
}

impl TemplateLayoutMap {
    /// The map compiled into the crate.
    pub fn bundled() -> Self {
        // Parsed in tests/template_map.rs, so the empty fallback is unreachable in practice.
        Self::from_json_str(BUNDLED_TEMPLATE_MAPS).unwrap_or_default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, TemplateMapError> {
        let entries: HashMap<String, TemplateMapEntry> = serde_json::from_str(json)?;
        debug!(templates = entries.len(), "Parsed template layout map");
        Ok(Self { entries })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TemplateMapError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let map = Self::from_json_str(&content)?;
        info!(path = %path.display(), templates = map.entries.len(), "Loaded template layout map");
        Ok(map)
    }

    pub fn contains(&self, template_id: &str) -> bool {
        self.entries.contains_key(template_id)
    }

    pub fn entry(&self, template_id: &str) -> Option<&TemplateMapEntry> {
        self.entries.get(template_id)
    }

    /// Resolved bindings; unknown or missing ids fall back to the documented defaults.
    pub fn layout_for(&self, template_id: Option<&str>) -> TemplateLayout {
        template_id
            .and_then(|id| self.entries.get(id))
            .map(TemplateLayout::from)
            .unwrap_or_default()
    }

    pub fn template_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.entries.keys().map(|k| k.as_str()).collect();
        ids.sort_unstable();
        ids
    }
}

/// Templates offered by the template selection step.
pub fn builtin_templates() -> Vec<TemplateDescriptor> {
    vec![
        TemplateDescriptor {
            id: "bell-enterprise".to_string(),
            name: "Bell Canada Template".to_string(),
            category: "Enterprise AI Study".to_string(),
            slides: 18,
            template_file: "BellCanadaTemplate.pptx".to_string(),
        },
        TemplateDescriptor {
            id: "internal-strategy".to_string(),
            name: "Internal Strategy".to_string(),
            category: "Finance".to_string(),
            slides: 12,
            template_file: "11b - alien minds - slides.pptx".to_string(),
        },
        TemplateDescriptor {
            id: "quarterly-review".to_string(),
            name: "Quarterly Review".to_string(),
            category: "Executive".to_string(),
            slides: 24,
            template_file: "1%2B-%2BIntroduction%2Bto%2B2244.pptx".to_string(),
        },
    ]
}

/// Looks up a built-in template by id.
pub fn find_template(template_id: &str) -> Option<TemplateDescriptor> {
    builtin_templates().into_iter().find(|t| t.id == template_id)
}

/// Style guideline embedded in the generation prompt, keyed by template id.
pub fn style_guide(template_id: Option<&str>) -> String {
    let lines: &[&str] = match template_id {
        Some("bell-enterprise") => &[
            "Bell Canada corporate style: clean blue (#005596) headers, white backgrounds.",
            "Large title text, generous whitespace, professional look.",
            "Simple bullet lists, conservative spacing.",
            "Bell Confidential footer for internal documents.",
        ],
        Some("internal-strategy") => &[
            "Modern strategy presentation style.",
            "Bold headings, clear visual hierarchy.",
            "Use bullet points for key insights.",
            "Professional but engaging tone.",
        ],
        Some("quarterly-review") => &[
            "Executive quarterly review format.",
            "Data-driven with clear metrics.",
            "Concise bullet points.",
            "Professional corporate style.",
        ],
        _ => return DEFAULT_STYLE_GUIDE.to_string(),
    };
    lines.join(" ")
}
