//! Local PDF rendering of a deck, used when the template service cannot be.
//!
//! Rendering is split in two: [`plan_pages`] lays the deck out into pages of
//! wrapped lines, and [`render_pdf`] turns that plan into `printpdf` operations.
//! Every non-empty bullet ends up on some page; a slide whose bullets do not fit
//! continues on extra pages.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use printpdf::{
    BuiltinFont, Color, FontId, Mm, Op, ParsedFont, PdfDocument, PdfPage, PdfSaveOptions, Point,
    Pt, RawImage, Rgb, TextItem, XObjectTransform,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{Deck, ImagePosition, Slide};

// 10 x 7.5 inch landscape page, in points.
const PAGE_WIDTH: f32 = 720.0;
const PAGE_HEIGHT: f32 = 540.0;
const PAGE_WIDTH_MM: f32 = 254.0;
const PAGE_HEIGHT_MM: f32 = 190.5;
const MARGIN: f32 = 48.0;

const TITLE_SIZE: f32 = 28.0;
const SUBTITLE_SIZE: f32 = 18.0;
const HEADING_SIZE: f32 = 24.0;
const BODY_SIZE: f32 = 14.0;
const BODY_LEADING: f32 = 20.0;
const FOOTER_SIZE: f32 = 9.0;

const BODY_TOP: f32 = PAGE_HEIGHT - 120.0;
const BODY_BOTTOM: f32 = 60.0;
const COLUMN_GAP: f32 = 24.0;

/// Rough Helvetica advance width as a fraction of the font size.
const AVG_CHAR_WIDTH: f32 = 0.5;

const BULLET_PREFIX: &str = "- ";
/// Drawn in place of characters the face has no glyph for.
const MISSING_GLYPH: char = '?';
/// Helvetica space width, in thousandths of an em.
const SPACE_ADVANCE: f32 = 278.0;
const CONTINUATION_INDENT: &str = "  ";

#[derive(Error, Debug)]
pub enum RenderPdfError {
    #[error("deck has no slides")]
    EmptyInput,
}

/// Image placed beside the body text of a content page.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedImage {
    pub data_url: String,
    pub caption: String,
    pub position: ImagePosition,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageContent {
    Title {
        title: String,
        subtitle: Option<String>,
    },
    Content {
        title: String,
        lines: Vec<String>,
        image: Option<PlacedImage>,
    },
}

/// One output page. `number` starts at 1.
#[derive(Debug, Clone, PartialEq)]
pub struct PagePlan {
    pub number: usize,
    pub content: PageContent,
}

fn chars_per_line(width: f32, size: f32) -> usize {
    ((width / (size * AVG_CHAR_WIDTH)).floor() as usize).max(1)
}

fn body_width(has_image: bool) -> f32 {
    let full = PAGE_WIDTH - 2.0 * MARGIN;
    if has_image {
        (full - COLUMN_GAP) / 2.0
    } else {
        full
    }
}

fn lines_per_page() -> usize {
    ((BODY_TOP - BODY_BOTTOM) / BODY_LEADING).floor() as usize
}

/// Greedy word wrap to `width` characters. Words longer than a line are split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        let word: String = word.into_iter().collect();
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn bullet_lines(slide: &Slide, width: usize) -> Vec<String> {
    let text_width = width.saturating_sub(BULLET_PREFIX.len()).max(1);
    slide
        .visible_bullets()
        .flat_map(|bullet| {
            wrap_text(bullet.trim(), text_width)
                .into_iter()
                .enumerate()
                .map(|(i, line)| {
                    let prefix = if i == 0 { BULLET_PREFIX } else { CONTINUATION_INDENT };
                    format!("{prefix}{line}")
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Lays the deck out into pages.
pub fn plan_pages(deck: &Deck) -> Vec<PagePlan> {
    let mut pages: Vec<PageContent> = Vec::new();
    for (index, slide) in deck.slides.iter().enumerate() {
        if index == 0 {
            pages.push(PageContent::Title {
                title: slide.title.clone(),
                subtitle: slide.subtitle.clone().filter(|s| !s.trim().is_empty()),
            });
            continue;
        }

        let image = slide.image_data.as_ref().map(|data| PlacedImage {
            data_url: data.clone(),
            caption: slide
                .image_ref
                .clone()
                .unwrap_or_else(|| "image".to_string()),
            position: slide.image_position,
        });
        let width = chars_per_line(body_width(image.is_some()), BODY_SIZE);
        let lines = bullet_lines(slide, width);
        let mut chunks = lines.chunks(lines_per_page());

        pages.push(PageContent::Content {
            title: slide.title.clone(),
            lines: chunks.next().map(<[String]>::to_vec).unwrap_or_default(),
            image,
        });
        for chunk in chunks {
            pages.push(PageContent::Content {
                title: format!("{} (cont.)", slide.title),
                lines: chunk.to_vec(),
                image: None,
            });
        }
    }
    pages
        .into_iter()
        .enumerate()
        .map(|(i, content)| PagePlan {
            number: i + 1,
            content,
        })
        .collect()
}

fn black() -> Color {
    Color::Rgb(Rgb {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        icc_profile: None,
    })
}

fn grey() -> Color {
    Color::Rgb(Rgb {
        r: 0.45,
        g: 0.45,
        b: 0.45,
        icc_profile: None,
    })
}

/// A Helvetica face embedded as a font file, so text is written by glyph id.
///
/// Built-in PDF fonts only take single-byte WinAnsi strings, which garbles
/// anything outside ASCII. When the bundled face cannot be parsed the
/// built-in font is used with non-ASCII characters replaced.
struct Face {
    builtin: BuiltinFont,
    embedded: Option<(FontId, ParsedFont)>,
}

impl Face {
    fn load(doc: &mut PdfDocument, builtin: BuiltinFont) -> Self {
        let mut warnings = Vec::new();
        let subset = builtin.get_subset_font();
        let embedded = ParsedFont::from_bytes(&subset.bytes, 0, &mut warnings)
            .filter(|font| has_glyph(font, 'A'))
            .map(|font| (doc.add_font(&font), font));
        if embedded.is_none() {
            warn!(font = builtin.get_id(), "Could not embed font, non-ASCII text will be replaced");
        }
        Self { builtin, embedded }
    }

    /// `text` as TJ items this face can draw. The embedded subsets carry no
    /// space glyph, so whitespace becomes a horizontal offset.
    fn text_items(&self, text: &str) -> Vec<TextItem> {
        let Some((_, font)) = &self.embedded else {
            return vec![TextItem::Text(text.chars().map(ascii_substitute).collect())];
        };
        let mut items = Vec::new();
        let mut run = String::new();
        for c in text.chars() {
            if c.is_whitespace() {
                if !run.is_empty() {
                    items.push(TextItem::Text(std::mem::take(&mut run)));
                }
                items.push(TextItem::Offset(-SPACE_ADVANCE));
            } else if has_glyph(font, c) {
                run.push(c);
            } else {
                run.push(MISSING_GLYPH);
            }
        }
        if !run.is_empty() {
            items.push(TextItem::Text(run));
        }
        items
    }
}

fn has_glyph(font: &ParsedFont, c: char) -> bool {
    font.lookup_glyph_index(c as u32).is_some_and(|gid| gid != 0)
}

fn ascii_substitute(c: char) -> char {
    match c {
        ' '..='~' => c,
        '\u{2018}' | '\u{2019}' => '\'',
        '\u{201C}' | '\u{201D}' => '"',
        '\u{2013}' | '\u{2014}' => '-',
        '\u{00A0}' => ' ',
        _ => MISSING_GLYPH,
    }
}

struct Faces {
    regular: Face,
    bold: Face,
    oblique: Face,
}

impl Faces {
    fn load(doc: &mut PdfDocument) -> Self {
        Self {
            regular: Face::load(doc, BuiltinFont::Helvetica),
            bold: Face::load(doc, BuiltinFont::HelveticaBold),
            oblique: Face::load(doc, BuiltinFont::HelveticaOblique),
        }
    }
}

fn text_at(ops: &mut Vec<Op>, text: &str, x: f32, y: f32, size: f32, face: &Face, col: Color) {
    let items = face.text_items(text);
    ops.push(Op::StartTextSection);
    ops.push(Op::SetFillColor { col });
    match &face.embedded {
        Some((id, _)) => ops.push(Op::SetFontSize {
            size: Pt(size),
            font: id.clone(),
        }),
        None => ops.push(Op::SetFontSizeBuiltinFont {
            size: Pt(size),
            font: face.builtin,
        }),
    }
    ops.push(Op::SetTextCursor {
        pos: Point {
            x: Pt(x),
            y: Pt(y),
        },
    });
    match &face.embedded {
        Some((id, _)) => ops.push(Op::WriteText {
            items,
            font: id.clone(),
        }),
        None => ops.push(Op::WriteTextBuiltinFont {
            items,
            font: face.builtin,
        }),
    }
    ops.push(Op::EndTextSection);
}

fn centered_x(text: &str, size: f32) -> f32 {
    let width = text.chars().count() as f32 * size * AVG_CHAR_WIDTH;
    ((PAGE_WIDTH - width) / 2.0).max(MARGIN)
}

fn decode_data_url(data_url: &str) -> Option<Vec<u8>> {
    let (_, payload) = data_url.split_once("base64,")?;
    BASE64.decode(payload.trim()).ok()
}

/// Draws the image into its column, or a caption when it cannot be decoded.
fn place_image(doc: &mut PdfDocument, ops: &mut Vec<Op>, image: &PlacedImage, caption_face: &Face) {
    let column = body_width(true);
    let x = match image.position {
        ImagePosition::Left => MARGIN,
        ImagePosition::Right => MARGIN + column + COLUMN_GAP,
    };
    let max_height = BODY_TOP - BODY_BOTTOM;

    let mut warnings = Vec::new();
    let decoded = decode_data_url(&image.data_url)
        .ok_or_else(|| "not a base64 data URL".to_string())
        .and_then(|bytes| RawImage::decode_from_bytes(&bytes, &mut warnings));
    match decoded {
        Ok(raw) if raw.width > 0 && raw.height > 0 => {
            // Native size at the default 300 dpi, in points.
            let native_w = raw.width as f32 * 72.0 / 300.0;
            let native_h = raw.height as f32 * 72.0 / 300.0;
            let scale = (column / native_w).min(max_height / native_h);
            let drawn_h = native_h * scale;
            let id = doc.add_image(&raw);
            ops.push(Op::UseXobject {
                id,
                transform: XObjectTransform {
                    translate_x: Some(Pt(x)),
                    translate_y: Some(Pt(BODY_TOP - drawn_h)),
                    scale_x: Some(scale),
                    scale_y: Some(scale),
                    ..Default::default()
                },
            });
        }
        Ok(_) | Err(_) => {
            warn!(image = %image.caption, "Could not embed image, writing caption instead");
            text_at(
                ops,
                &format!("[Image: {}]", image.caption),
                x,
                BODY_TOP - BODY_LEADING,
                BODY_SIZE,
                caption_face,
                grey(),
            );
        }
    }
}

/// Renders the deck as a PDF, one or more pages per slide.
///
/// `watermark` is stamped in the footer of every page when present.
pub fn render_pdf(deck: &Deck, watermark: Option<&str>) -> Result<Vec<u8>, RenderPdfError> {
    if deck.slides.is_empty() {
        return Err(RenderPdfError::EmptyInput);
    }
    let plan = plan_pages(deck);
    let mut doc = PdfDocument::new(&deck.title);
    let faces = Faces::load(&mut doc);
    let mut pages = Vec::with_capacity(plan.len());

    for page in &plan {
        let mut ops = Vec::new();
        match &page.content {
            PageContent::Title { title, subtitle } => {
                let y = PAGE_HEIGHT / 2.0 + 10.0;
                text_at(&mut ops, title, centered_x(title, TITLE_SIZE), y, TITLE_SIZE, &faces.bold, black());
                if let Some(subtitle) = subtitle {
                    text_at(
                        &mut ops,
                        subtitle,
                        centered_x(subtitle, SUBTITLE_SIZE),
                        y - 40.0,
                        SUBTITLE_SIZE,
                        &faces.regular,
                        grey(),
                    );
                }
            }
            PageContent::Content { title, lines, image } => {
                text_at(&mut ops, title, MARGIN, PAGE_HEIGHT - 72.0, HEADING_SIZE, &faces.bold, black());
                let text_x = match image {
                    Some(PlacedImage {
                        position: ImagePosition::Left,
                        ..
                    }) => MARGIN + body_width(true) + COLUMN_GAP,
                    _ => MARGIN,
                };
                for (i, line) in lines.iter().enumerate() {
                    let y = BODY_TOP - BODY_LEADING * i as f32;
                    text_at(&mut ops, line, text_x, y, BODY_SIZE, &faces.regular, black());
                }
                if let Some(image) = image {
                    place_image(&mut doc, &mut ops, image, &faces.oblique);
                }
            }
        }

        if let Some(mark) = watermark {
            text_at(&mut ops, mark, MARGIN, 24.0, FOOTER_SIZE, &faces.regular, grey());
        }
        let number = page.number.to_string();
        text_at(&mut ops, &number, PAGE_WIDTH - MARGIN, 24.0, FOOTER_SIZE, &faces.regular, grey());

        pages.push(PdfPage::new(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), ops));
    }

    let mut warnings = Vec::new();
    let bytes = doc
        .with_pages(pages)
        .save(&PdfSaveOptions::default(), &mut warnings);
    debug!(
        pages = plan.len(),
        bytes = bytes.len(),
        warnings = warnings.len(),
        "Rendered deck to PDF"
    );
    Ok(bytes)
}
