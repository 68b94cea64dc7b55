use async_trait::async_trait;
use deckwright_core::config::GenerationSettings;
use deckwright_core::contract::{ChatRequest, CompletionClient, MockCompletionClient};
use deckwright_core::error::{CompletionError, GenerationError};
use deckwright_core::generate::DeckGenerator;
use deckwright_core::ingest::UploadedFile;
use deckwright_core::normalize::{FALLBACK_BULLETS, FALLBACK_SLIDE_TITLE};
use deckwright_core::prompt::TRUNCATION_MARKER;
use deckwright_core::template::{find_template, TemplateLayoutMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const REPLY: &str = r#"{
  "title": "Network Strategy 2025",
  "slides": [
    {"title": "Network Strategy 2025", "subtitle": "Board update", "bullets": [], "confidence": 92},
    {"title": "Executive Summary", "bullets": ["Fibre reach grew 12%", "Capex held flat"], "confidence": 88},
    {"title": "Rollout", "bullets": ["Phase 1 complete", "Phase 2 in Q3"], "image_ref": "map"}
  ]
}"#;

fn files() -> Vec<UploadedFile> {
    vec![
        UploadedFile::from_bytes("notes.txt", "text/plain", "Fibre reach grew 12% this year."),
        UploadedFile::from_bytes("map.png", "image/png", vec![0x89, b'P', b'N', b'G']),
    ]
}

fn generator(client: MockCompletionClient) -> DeckGenerator<MockCompletionClient> {
    DeckGenerator::new(client, TemplateLayoutMap::bundled(), GenerationSettings::default())
}

#[tokio::test]
async fn generates_normalized_deck_from_files() {
    let mut client = MockCompletionClient::new();
    client
        .expect_complete()
        .times(1)
        .returning(|_| Ok(REPLY.to_string()));

    let template = find_template("internal-strategy");
    let deck = generator(client)
        .generate(&files(), template.as_ref(), |_, _| {})
        .await
        .expect("generation should succeed");

    assert_eq!(deck.title, "Network Strategy 2025");
    assert_eq!(deck.slides.len(), 3);
    let ids: Vec<u32> = deck.slides.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(deck.slides[0].subtitle.as_deref(), Some("Board update"));
    // internal-strategy maps content slides to layout 2.
    assert_eq!(deck.slides[0].layout_index, 0);
    assert_eq!(deck.slides[1].layout_index, 2);
    assert_eq!(deck.slides[2].confidence, 85);
    assert!(deck.slides[2]
        .image_data
        .as_deref()
        .is_some_and(|d| d.starts_with("data:image/png;base64,")));
    assert_eq!(deck.images.len(), 1);
    assert_eq!(deck.template.as_ref().map(|t| t.id.as_str()), Some("internal-strategy"));
    for slide in &deck.slides {
        let evidence = slide.source_evidence.as_ref().expect("evidence attached");
        assert!((1..=20).contains(&evidence.page));
        assert!(evidence.text.contains("notes.txt"));
    }
}

#[tokio::test]
async fn request_carries_json_format_and_template_hints() {
    let seen: Arc<Mutex<Option<ChatRequest>>> = Arc::new(Mutex::new(None));
    let captured = seen.clone();
    let mut client = MockCompletionClient::new();
    client.expect_complete().returning(move |req| {
        *captured.lock().unwrap() = Some(req);
        Ok(REPLY.to_string())
    });

    let template = find_template("quarterly-review");
    generator(client)
        .generate(&files(), template.as_ref(), |_, _| {})
        .await
        .unwrap();

    let request = seen.lock().unwrap().take().expect("request captured");
    let body = serde_json::to_value(&request).unwrap();
    assert_eq!(body["response_format"]["type"], "json_object");
    let instruction = &request.messages[1].content;
    assert!(instruction.contains("with 24 slides"));
    assert!(instruction.contains("# notes.txt (text)"));
    assert!(instruction.contains("IMAGE PLACEMENT RULES"));
    assert!(instruction.contains("map.png"));
}

#[tokio::test]
async fn oversized_content_is_truncated_with_marker() {
    let seen: Arc<Mutex<Option<ChatRequest>>> = Arc::new(Mutex::new(None));
    let captured = seen.clone();
    let mut client = MockCompletionClient::new();
    client.expect_complete().returning(move |req| {
        *captured.lock().unwrap() = Some(req);
        Ok(REPLY.to_string())
    });
    let settings = GenerationSettings {
        max_input_chars: 100,
        ..GenerationSettings::default()
    };
    let big = UploadedFile::from_bytes("big.txt", "text/plain", "x".repeat(5_000));

    DeckGenerator::new(client, TemplateLayoutMap::bundled(), settings)
        .generate(&[big], None, |_, _| {})
        .await
        .unwrap();

    let request = seen.lock().unwrap().take().unwrap();
    let instruction = &request.messages[1].content;
    assert!(instruction.ends_with(TRUNCATION_MARKER));
    assert!(instruction.contains("with 12 slides"));
}

#[tokio::test]
async fn progress_is_monotonic_and_completes() {
    let mut client = MockCompletionClient::new();
    client.expect_complete().returning(|_| Ok(REPLY.to_string()));

    let mut seen: Vec<(u8, String)> = Vec::new();
    generator(client)
        .generate(&files(), None, |p, m| seen.push((p, m.to_string())))
        .await
        .unwrap();

    let percents: Vec<u8> = seen.iter().map(|(p, _)| *p).collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");
    assert_eq!(percents.first(), Some(&5));
    assert_eq!(percents.last(), Some(&100));
    for checkpoint in [10, 30, 50, 80, 90] {
        assert!(percents.contains(&checkpoint), "missing {checkpoint}: {percents:?}");
    }
    assert!(seen.iter().any(|(_, m)| m == "Reading map.png..."));
}

#[tokio::test]
async fn unparseable_reply_yields_fallback_deck() {
    let mut client = MockCompletionClient::new();
    client
        .expect_complete()
        .returning(|_| Ok("Sorry, I cannot help with that.".to_string()));

    let deck = generator(client)
        .generate(&files(), None, |_, _| {})
        .await
        .expect("fallback deck");

    assert_eq!(deck.title, "Generated Presentation");
    assert_eq!(deck.slides.len(), 1);
    assert_eq!(deck.slides[0].title, FALLBACK_SLIDE_TITLE);
    assert_eq!(deck.slides[0].bullets, FALLBACK_BULLETS.map(String::from).to_vec());
    assert_eq!(deck.slides[0].confidence, 70);
}

#[tokio::test]
async fn service_status_error_is_propagated_with_body() {
    let mut client = MockCompletionClient::new();
    client.expect_complete().returning(|_| {
        Err(CompletionError::Status {
            status: 429,
            body: "rate limited".to_string(),
        })
    });

    let err = generator(client)
        .generate(&files(), None, |_, _| {})
        .await
        .unwrap_err();

    assert_eq!(
        err,
        GenerationError::Status {
            status: 429,
            body: "rate limited".to_string()
        }
    );
}

#[tokio::test]
async fn blank_reply_is_an_empty_response_error() {
    let mut client = MockCompletionClient::new();
    client.expect_complete().returning(|_| Ok("   ".to_string()));

    let err = generator(client)
        .generate(&files(), None, |_, _| {})
        .await
        .unwrap_err();
    assert_eq!(err, GenerationError::EmptyResponse);
}

struct StalledClient;

#[async_trait]
impl CompletionClient for StalledClient {
    async fn complete(&self, _request: ChatRequest) -> Result<String, CompletionError> {
        tokio::time::sleep(Duration::from_secs(3_600)).await;
        Ok(REPLY.to_string())
    }
}

#[tokio::test(start_paused = true)]
async fn slow_service_times_out() {
    let settings = GenerationSettings {
        timeout_secs: 5,
        ..GenerationSettings::default()
    };
    let generator = DeckGenerator::new(StalledClient, TemplateLayoutMap::bundled(), settings);

    let err = generator
        .generate(&files(), None, |_, _| {})
        .await
        .unwrap_err();
    assert_eq!(err, GenerationError::Timeout);
    assert_eq!(err.to_string(), "timeout");
}

#[tokio::test]
async fn unreadable_file_becomes_placeholder_not_failure() {
    let seen: Arc<Mutex<Option<ChatRequest>>> = Arc::new(Mutex::new(None));
    let captured = seen.clone();
    let mut client = MockCompletionClient::new();
    client.expect_complete().returning(move |req| {
        *captured.lock().unwrap() = Some(req);
        Ok(REPLY.to_string())
    });

    let missing = UploadedFile::from_path("/definitely/not/here/report.pdf");
    generator(client)
        .generate(&[missing], None, |_, _| {})
        .await
        .expect("generation continues past unreadable files");

    let request = seen.lock().unwrap().take().unwrap();
    assert!(request.messages[1]
        .content
        .contains("# report.pdf (error)\nError reading file:"));
}
