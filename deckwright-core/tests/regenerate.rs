use async_trait::async_trait;
use deckwright_core::config::{GenerationSettings, RegenerationSettings};
use deckwright_core::contract::{ChatRequest, CompletionClient, MockCompletionClient};
use deckwright_core::error::{CompletionError, EditError};
use deckwright_core::generate::DeckGenerator;
use deckwright_core::ingest::UploadedFile;
use deckwright_core::model::{Deck, Slide};
use deckwright_core::regenerate::{Regenerator, NEW_BULLET_FALLBACK};
use deckwright_core::store::{DeckStore, FIRST_VERSION_NAME};
use deckwright_core::template::TemplateLayoutMap;
use deckwright_core::workflow::{
    generate_into_store, regenerate_all_bullets, BulletEdit, FieldKey, InFlightTracker,
    NewBulletEdit, TitleEdit,
};
use std::time::Duration;

fn regenerator(client: MockCompletionClient) -> Regenerator<MockCompletionClient> {
    Regenerator::new(client, RegenerationSettings::default())
}

fn store_with_deck() -> DeckStore {
    let mut deck = Deck::new("Deck", None);
    let mut cover = Slide::new(1, "Cover");
    cover.confidence = 90;
    let mut body = Slide::new(2, "Findings");
    body.bullets = vec!["first".into(), "second".into(), "third".into()];
    deck.slides = vec![cover, body];
    let mut store = DeckStore::new();
    store.set_deck(deck);
    store
}

#[tokio::test]
async fn returns_trimmed_completion() {
    let mut client = MockCompletionClient::new();
    client
        .expect_complete()
        .returning(|_| Ok("  Sharper Title \n".to_string()));
    let title = regenerator(client).regenerate_title("ctx", "Old Title").await;
    assert_eq!(title, "Sharper Title");
}

#[tokio::test]
async fn failures_return_the_unchanged_value() {
    let mut client = MockCompletionClient::new();
    client
        .expect_complete()
        .returning(|_| Err(CompletionError::Transport("connection refused".to_string())));
    let regenerator = regenerator(client);

    assert_eq!(regenerator.regenerate_title("ctx", "Old Title").await, "Old Title");
    assert_eq!(regenerator.regenerate_bullet("ctx", "old bullet").await, "old bullet");
    assert_eq!(
        regenerator.generate_new_bullet("ctx", &["a".to_string()]).await,
        NEW_BULLET_FALLBACK
    );
}

#[tokio::test]
async fn blank_completion_returns_the_unchanged_value() {
    let mut client = MockCompletionClient::new();
    client.expect_complete().returning(|_| Ok("\n  ".to_string()));
    assert_eq!(
        regenerator(client).regenerate_bullet("ctx", "keep me").await,
        "keep me"
    );
}

#[tokio::test]
async fn requests_are_short_and_embed_current_value() {
    let mut client = MockCompletionClient::new();
    client
        .expect_complete()
        .withf(|req: &ChatRequest| {
            req.max_tokens == 100
                && req.response_format.is_none()
                && req.messages[1].content.contains("Current title: Old Title")
                && req.messages[1].content.contains("Context: revenue up")
        })
        .returning(|_| Ok("New".to_string()));
    regenerator(client)
        .regenerate_title("revenue up", "Old Title")
        .await;
}

struct StalledClient;

#[async_trait]
impl CompletionClient for StalledClient {
    async fn complete(&self, _request: ChatRequest) -> Result<String, CompletionError> {
        tokio::time::sleep(Duration::from_secs(3_600)).await;
        Ok("too late".to_string())
    }
}

#[tokio::test(start_paused = true)]
async fn timeout_returns_the_unchanged_value() {
    let regenerator = Regenerator::new(StalledClient, RegenerationSettings::default());
    assert_eq!(regenerator.regenerate_title("ctx", "Old").await, "Old");
}

#[test]
fn in_flight_keys_are_exclusive_until_released() {
    let tracker = InFlightTracker::new();
    let key = FieldKey::Bullet {
        slide_id: 2,
        index: 0,
    };
    let guard = tracker.begin(key).expect("first claim succeeds");
    assert!(tracker.begin(key).is_none(), "second claim is refused");
    assert!(tracker.is_pending(key));

    let other = tracker
        .begin(FieldKey::Bullet {
            slide_id: 2,
            index: 1,
        })
        .expect("unrelated key stays available");
    assert_eq!(tracker.pending_count(), 2);

    drop(guard);
    assert!(!tracker.is_pending(key));
    assert!(tracker.begin(key).is_some());
    drop(other);
    assert_eq!(tracker.pending_count(), 0);
}

#[tokio::test]
async fn title_edit_applies_by_slide_id_after_reorder() {
    let mut client = MockCompletionClient::new();
    client
        .expect_complete()
        .returning(|_| Ok("Key Findings".to_string()));
    let regenerator = regenerator(client);
    let tracker = InFlightTracker::new();
    let mut store = store_with_deck();

    let edit = TitleEdit::prepare(&store, &tracker, 1).unwrap();
    assert!(matches!(
        TitleEdit::prepare(&store, &tracker, 1),
        Err(EditError::InFlight(FieldKey::Title { slide_id: 2 }))
    ));
    let title = edit.run(&regenerator).await;

    // The slide moves while the request is pending.
    assert!(store.move_slide(1, 0));
    assert!(edit.apply(&mut store, title));

    assert_eq!(store.slide(0).unwrap().title, "Key Findings");
    assert_eq!(store.slide(1).unwrap().title, "Cover");
    assert_eq!(tracker.pending_count(), 0);
}

#[tokio::test]
async fn edit_for_removed_slide_is_a_no_op() {
    let mut client = MockCompletionClient::new();
    client.expect_complete().returning(|_| Ok("Changed".to_string()));
    let regenerator = regenerator(client);
    let tracker = InFlightTracker::new();
    let mut store = store_with_deck();

    let edit = BulletEdit::prepare(&store, &tracker, 1, 2).unwrap();
    let text = edit.run(&regenerator).await;
    store.set_deck(Deck::new("Replaced", None));

    assert!(!edit.apply(&mut store, text));
    assert!(store.deck().unwrap().slides.is_empty());
}

#[tokio::test]
async fn bullet_edit_rejects_missing_bullet_and_replaces_existing_one() {
    let mut client = MockCompletionClient::new();
    client
        .expect_complete()
        .withf(|req: &ChatRequest| {
            req.messages[1]
                .content
                .contains("Context: Findings. Other points: first third")
        })
        .returning(|_| Ok("better second".to_string()));
    let regenerator = regenerator(client);
    let tracker = InFlightTracker::new();
    let mut store = store_with_deck();

    assert!(matches!(
        BulletEdit::prepare(&store, &tracker, 1, 9),
        Err(EditError::NoBullet { slide_id: 2, index: 9 })
    ));
    assert!(matches!(
        BulletEdit::prepare(&store, &tracker, 7, 0),
        Err(EditError::NoSlide(7))
    ));

    let edit = BulletEdit::prepare(&store, &tracker, 1, 1).unwrap();
    let text = edit.run(&regenerator).await;
    assert!(edit.apply(&mut store, text));
    assert_eq!(
        store.slide(1).unwrap().bullets,
        vec!["first", "better second", "third"]
    );
}

#[tokio::test]
async fn new_bullet_is_appended() {
    let mut client = MockCompletionClient::new();
    client
        .expect_complete()
        .returning(|_| Ok("fourth".to_string()));
    let regenerator = regenerator(client);
    let mut store = store_with_deck();

    let edit = NewBulletEdit::prepare(&store, 1).unwrap();
    let text = edit.run(&regenerator).await;
    assert!(edit.apply(&mut store, text));
    assert_eq!(store.slide(1).unwrap().bullets.len(), 4);
    assert_eq!(store.slide(1).unwrap().bullets[3], "fourth");
}

#[tokio::test]
async fn all_bullets_are_rewritten_concurrently_skipping_pending_ones() {
    let mut client = MockCompletionClient::new();
    client
        .expect_complete()
        .times(2)
        .returning(|req| {
            let current = req.messages[1]
                .content
                .lines()
                .find_map(|l| l.strip_prefix("Current bullet point: "))
                .unwrap_or_default()
                .to_string();
            Ok(current.to_uppercase())
        });
    let regenerator = regenerator(client);
    let tracker = InFlightTracker::new();
    let mut store = store_with_deck();

    let _held = tracker
        .begin(FieldKey::Bullet {
            slide_id: 2,
            index: 0,
        })
        .unwrap();
    let written = regenerate_all_bullets(&mut store, &tracker, &regenerator, 1)
        .await
        .unwrap();

    assert_eq!(written, 2);
    assert_eq!(store.slide(1).unwrap().bullets, vec!["first", "SECOND", "THIRD"]);
}

#[tokio::test]
async fn generation_populates_store_and_first_version() {
    let mut client = MockCompletionClient::new();
    client.expect_complete().returning(|_| {
        Ok(r#"{"title": "From Files", "slides": [{"title": "From Files"}, {"title": "A", "bullets": ["b"]}]}"#.to_string())
    });
    let generator = DeckGenerator::new(client, TemplateLayoutMap::bundled(), GenerationSettings::default());
    let mut store = DeckStore::new();
    store.add_file(UploadedFile::from_bytes("in.txt", "text/plain", "content"));

    generate_into_store(&mut store, &generator, |_, _| {})
        .await
        .unwrap();

    let deck = store.deck().expect("deck set");
    assert_eq!(deck.title, "From Files");
    assert_eq!(store.versions().len(), 1);
    assert_eq!(store.versions()[0].name, FIRST_VERSION_NAME);
    assert_eq!(&store.versions()[0].deck, deck);
}

#[tokio::test]
async fn failed_generation_leaves_store_untouched() {
    let mut client = MockCompletionClient::new();
    client
        .expect_complete()
        .returning(|_| Err(CompletionError::Status { status: 500, body: "boom".into() }));
    let generator = DeckGenerator::new(client, TemplateLayoutMap::bundled(), GenerationSettings::default());
    let mut store = store_with_deck();
    let before = store.clone();

    assert!(generate_into_store(&mut store, &generator, |_, _| {}).await.is_err());
    assert_eq!(store, before);
}
