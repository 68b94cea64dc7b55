use async_trait::async_trait;
use chrono::NaiveDate;
use deckwright_core::config::ExportSettings;
use deckwright_core::contract::{ExportRequest, MockRenderService, RenderService};
use deckwright_core::error::{ExportError, RenderError};
use deckwright_core::export::{ExportFormat, Exporter};
use deckwright_core::model::{Deck, ImagePosition, Slide};
use deckwright_core::render::{plan_pages, render_pdf, PageContent};
use deckwright_core::store::DeckStore;
use deckwright_core::template::{find_template, TemplateLayoutMap};
use std::time::Duration;
use tempfile::tempdir;

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()
}

fn sample_deck() -> Deck {
    let mut deck = Deck::new("Board Update", None);
    let mut cover = Slide::new(1, "Board Update");
    cover.subtitle = Some("January".to_string());
    let mut body = Slide::new(2, "Highlights");
    body.bullets = vec!["Revenue up".to_string(), "Churn down".to_string()];
    deck.slides = vec![cover, body];
    deck
}

fn exporter(renderer: MockRenderService) -> Exporter<MockRenderService> {
    Exporter::new(renderer, TemplateLayoutMap::bundled(), ExportSettings::default())
}

#[tokio::test]
async fn known_template_uses_render_service() {
    let mut renderer = MockRenderService::new();
    renderer
        .expect_render()
        .withf(|req: &ExportRequest| req.template_id == "bell-enterprise" && req.internal_use_only)
        .times(1)
        .returning(|_| Ok(b"PK\x03\x04pptx".to_vec()));

    let file = exporter(renderer)
        .export_dated(&sample_deck(), true, Some("bell-enterprise"), date())
        .await
        .unwrap();

    assert_eq!(file.format, ExportFormat::Pptx);
    assert_eq!(file.filename, "Board Update_2025-01-31.pptx");
    assert_eq!(file.bytes, b"PK\x03\x04pptx".to_vec());
    assert!(file.fallback_reason.is_none());
}

#[test]
fn export_request_uses_camel_case_wire_names() {
    let request = ExportRequest {
        template_id: "bell-enterprise".to_string(),
        internal_use_only: false,
        deck: sample_deck(),
    };
    let json = serde_json::to_value(&request).unwrap();
    assert_eq!(json["templateId"], "bell-enterprise");
    assert_eq!(json["internalUseOnly"], false);
    assert_eq!(json["deck"]["slides"][1]["image_position"], "right");
}

#[tokio::test]
async fn unknown_template_renders_locally_without_calling_service() {
    let mut renderer = MockRenderService::new();
    renderer.expect_render().never();

    let file = exporter(renderer)
        .export_dated(&sample_deck(), true, Some("no-such-template"), date())
        .await
        .unwrap();

    assert_eq!(file.format, ExportFormat::Pdf);
    assert_eq!(file.filename, "Board Update_2025-01-31.pdf");
    assert_eq!(&file.bytes[0..4], b"%PDF");
    assert!(file.fallback_reason.unwrap().contains("no-such-template"));
}

#[tokio::test]
async fn service_error_falls_back_to_local_pdf() {
    let mut renderer = MockRenderService::new();
    renderer.expect_render().returning(|_| {
        Err(RenderError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        })
    });

    let file = exporter(renderer)
        .export_dated(&sample_deck(), false, Some("quarterly-review"), date())
        .await
        .unwrap();

    assert_eq!(file.format, ExportFormat::Pdf);
    assert!(file.fallback_reason.unwrap().contains("502"));
}

struct StalledRenderer;

#[async_trait]
impl RenderService for StalledRenderer {
    async fn render(&self, _request: ExportRequest) -> Result<Vec<u8>, RenderError> {
        tokio::time::sleep(Duration::from_secs(3_600)).await;
        Ok(Vec::new())
    }
}

#[tokio::test(start_paused = true)]
async fn primary_timeout_falls_back_to_local_pdf() {
    let exporter = Exporter::new(
        StalledRenderer,
        TemplateLayoutMap::bundled(),
        ExportSettings::default(),
    );
    let file = exporter
        .export_dated(&sample_deck(), true, Some("bell-enterprise"), date())
        .await
        .unwrap();
    assert_eq!(file.format, ExportFormat::Pdf);
    assert_eq!(file.fallback_reason.as_deref(), Some("timeout"));
}

#[tokio::test]
async fn empty_deck_is_rejected() {
    let mut renderer = MockRenderService::new();
    renderer.expect_render().never();
    let err = exporter(renderer)
        .export_dated(&Deck::new("Empty", None), true, None, date())
        .await
        .unwrap_err();
    assert_eq!(err, ExportError::EmptyDeck);
    assert_eq!(err.to_string(), "No deck to export");
}

#[tokio::test]
async fn store_export_uses_selected_template_and_flag() {
    let mut renderer = MockRenderService::new();
    renderer
        .expect_render()
        .withf(|req: &ExportRequest| req.template_id == "internal-strategy" && !req.internal_use_only)
        .returning(|_| Ok(vec![1, 2, 3]));

    let mut store = DeckStore::new();
    assert_eq!(
        exporter(MockRenderService::new()).export_store(&store).await.unwrap_err(),
        ExportError::EmptyDeck
    );
    store.set_deck(sample_deck());
    store.set_template(find_template("internal-strategy"));
    store.set_internal_use_only(false);

    let file = exporter(renderer).export_store(&store).await.unwrap();
    assert_eq!(file.format, ExportFormat::Pptx);

    let dir = tempdir().unwrap();
    let path = file.save_to(dir.path().join("out")).unwrap();
    assert_eq!(std::fs::read(path).unwrap(), vec![1, 2, 3]);
}

#[test]
fn local_layout_keeps_every_bullet() {
    let mut deck = sample_deck();
    let long: Vec<String> = (0..40)
        .map(|i| format!("Bullet number {i} describes a finding in enough words to wrap across lines"))
        .collect();
    deck.slides[1].bullets = long.clone();
    deck.slides[1].image_data = Some("data:image/png;base64,AAAA".to_string());
    deck.slides[1].image_ref = Some("chart.png".to_string());
    deck.slides[1].image_position = ImagePosition::Left;

    let pages = plan_pages(&deck);
    assert!(pages.len() > 2, "overflow must continue on extra pages");
    assert!(matches!(pages[0].content, PageContent::Title { .. }));
    let numbers: Vec<usize> = pages.iter().map(|p| p.number).collect();
    assert_eq!(numbers, (1..=pages.len()).collect::<Vec<_>>());

    let text: String = pages
        .iter()
        .filter_map(|p| match &p.content {
            PageContent::Content { lines, .. } => Some(
                lines
                    .iter()
                    .map(|l| l.trim_start_matches("- ").trim())
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            PageContent::Title { .. } => None,
        })
        .collect::<Vec<_>>()
        .join(" ");
    for bullet in &long {
        assert!(text.contains(bullet.as_str()), "missing: {bullet}");
    }
}

#[test]
fn local_pdf_is_valid_even_with_undecodable_image() {
    let mut deck = sample_deck();
    deck.slides[1].image_data = Some("data:image/png;base64,not-an-image".to_string());
    let bytes = render_pdf(&deck, Some("Bell Confidential")).unwrap();
    assert!(bytes.len() > 100);
    assert_eq!(&bytes[0..4], b"%PDF");
}

#[tokio::test]
async fn accented_deck_exports_locally_with_title_intact() {
    let mut deck = sample_deck();
    deck.title = "Bilan trimestriel \u{e0} Montr\u{e9}al".to_string();
    deck.slides[1].bullets = vec![
        "Chiffre d\u{2019}affaires en hausse \u{2014} caf\u{e9}s compris".to_string(),
        "\u{c9}quipe r\u{e9}organis\u{e9}e".to_string(),
    ];
    let mut renderer = MockRenderService::new();
    renderer.expect_render().never();

    let file = exporter(renderer)
        .export_dated(&deck, true, Some("no-such-template"), date())
        .await
        .unwrap();

    assert_eq!(file.filename, "Bilan trimestriel \u{e0} Montr\u{e9}al_2025-01-31.pdf");
    assert_eq!(&file.bytes[0..4], b"%PDF");
}
