//! Prompt construction for deck generation.

use crate::contract::{ChatMessage, ChatRequest, ResponseFormat};
use crate::config::GenerationSettings;
use crate::ingest::ExtractedContent;
use crate::model::TemplateDescriptor;
use crate::template::{style_guide, TemplateLayout};

pub const TRUNCATION_MARKER: &str = "[Content truncated due to length]";

const SYSTEM_PROMPT: &str = "You are an expert presentation designer creating executive-level presentations.
Your goal is to create COMPREHENSIVE slide decks that thoroughly cover all source material.
- Extract ALL key information from source documents
- Write detailed, informative bullet points (not vague statements)
- Include specific data: numbers, dates, percentages, names
- Create a proper title slide with subtitle
- Include executive summary and conclusion slides
- Place any uploaded images on appropriate slides
- Fill each slide with 4-6 substantial bullet points";

/// Joins extracted texts with `# name (kind)` boundary markers.
pub fn combine_content(content: &ExtractedContent) -> String {
    content
        .texts
        .iter()
        .map(|t| format!("# {} ({})\n{}", t.name, t.kind, t.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Clips `text` to `max_chars` characters, appending [`TRUNCATION_MARKER`] when clipped.
pub fn truncate_to_budget(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((cut, _)) => format!("{}\n\n{}", &text[..cut], TRUNCATION_MARKER),
    }
}

fn image_rules(content: &ExtractedContent) -> String {
    if content.images.is_empty() {
        return String::new();
    }
    let names = content
        .images
        .iter()
        .map(|i| i.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "

IMAGE PLACEMENT RULES:
You have {count} image(s): {names}
- DO NOT create separate slides just for images
- DO NOT write filler text describing images
- Add \"image_ref\": \"filename.jpg\" to an EXISTING content slide where the image is relevant
- Images will be displayed alongside the slide's bullet points automatically
- Only reference images on slides that already have meaningful content",
        count = content.images.len(),
    )
}

/// The user instruction for a whole-deck generation.
pub fn build_instruction(
    content: &ExtractedContent,
    template: Option<&TemplateDescriptor>,
    layout: &TemplateLayout,
    settings: &GenerationSettings,
) -> String {
    let slide_count = template
        .map(|t| t.slides)
        .filter(|n| *n > 0)
        .unwrap_or(settings.default_slide_count);
    let source = truncate_to_budget(&combine_content(content), settings.max_input_chars);
    let style = style_guide(template.map(|t| t.id.as_str()));
    let title_layout = layout.title_layout_index;
    let content_layout = layout.content_layout_index;
    let title_idx = layout.title_placeholder_idx;
    let body_idx = layout.body_placeholder_idx;
    let subtitle_idx = layout.subtitle_placeholder_idx;

    format!(
        "Create a comprehensive, professional slide deck with {slide_count} slides based on the SOURCE CONTENT below.

CRITICAL RULES:
1. Use ONLY the Source Content for facts, data, and bullet points - extract ALL key information
2. The template is for LAYOUT/STYLE only - do NOT use any template content as facts
3. Return valid JSON only
4. Be COMPREHENSIVE - fill each slide with detailed, valuable content

Template Style: {style}
Available Layouts: {layouts}
Layout Mapping: title_layout_index={title_layout}, content_layout_index={content_layout}
Placeholder IDs: title_idx={title_idx}, body_idx={body_idx}, subtitle_idx={subtitle_idx}
{images}

SLIDE STRUCTURE REQUIREMENTS:

1. TITLE SLIDE (Slide 1) - REQUIRED:
   - layout_index: {title_layout}
   - title: Compelling presentation title summarizing the content
   - subtitle: Brief tagline or date/author info
   - bullets: [] (empty for title slide)

2. EXECUTIVE SUMMARY SLIDE (Slide 2) - REQUIRED:
   - Provide 4-6 key takeaways from the entire document
   - Each bullet should be a complete, informative sentence

3. CONTENT SLIDES (Slides 3+):
   - layout_index: {content_layout}
   - 4-6 detailed bullet points per slide
   - Each bullet should be a full sentence or detailed phrase (15-30 words)
   - Cover ALL major topics, findings, data points from the source
   - Include specific numbers, percentages, dates when available

4. CONCLUSION/NEXT STEPS SLIDE (Final slide):
   - Summarize key recommendations or action items
   - 4-5 actionable bullet points

Return this exact JSON structure:
{{
  \"title\": \"[Presentation Title]\",
  \"slides\": [
    {{
      \"title\": \"[Slide Title]\",
      \"subtitle\": \"[For title slide only - optional for others]\",
      \"bullets\": [\"Detailed bullet 1 with full context\", \"Detailed bullet 2\", \"Bullet 3\", \"Bullet 4\"],
      \"confidence\": 85,
      \"layout_index\": {content_layout},
      \"title_placeholder_idx\": {title_idx},
      \"body_placeholder_idx\": {body_idx},
      \"image_ref\": \"filename.jpg or null\"
    }}
  ]
}}

CONTENT QUALITY RULES:
- Extract and summarize ALL major sections from the source document
- Each bullet should provide substantial information (not vague statements)
- Include specific data: numbers, percentages, dates, names when available
- Write in professional business language
- Confidence 70-95 based on how directly the content maps to source
- MINIMUM 4 bullets per content slide, MAXIMUM 6

SOURCE CONTENT:
{source}",
        layouts = layout.layout_description(),
        images = image_rules(content),
    )
}

/// The full chat request for a whole-deck generation.
pub fn generation_request(
    content: &ExtractedContent,
    template: Option<&TemplateDescriptor>,
    layout: &TemplateLayout,
    settings: &GenerationSettings,
) -> ChatRequest {
    ChatRequest {
        model: settings.model.clone(),
        messages: vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_instruction(content, template, layout, settings)),
        ],
        temperature: settings.temperature,
        max_tokens: settings.max_tokens,
        response_format: Some(ResponseFormat::json_object()),
    }
}
