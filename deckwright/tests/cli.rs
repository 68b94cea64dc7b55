use assert_cmd::Command;
use deckwright::session::{load_session, save_session};
use deckwright_core::model::{Deck, Slide, Version};
use deckwright_core::store::{DeckStore, FIRST_VERSION_NAME};
use deckwright_core::template::find_template;
use predicates::prelude::*;
use std::fs::write;
use std::path::Path;
use tempfile::{tempdir, NamedTempFile};

fn deckwright() -> Command {
    let mut cmd = Command::cargo_bin("deckwright").expect("Binary exists");
    cmd.env_remove("LLM_API_KEY");
    cmd
}

/// Config pointing the render service at a port nothing listens on.
fn offline_config() -> NamedTempFile {
    let config = NamedTempFile::new().expect("Creating temp config file failed");
    write(
        config.path(),
        "services:\n  completion_url: http://127.0.0.1:9/v1/chat/completions\n  render_url: http://127.0.0.1:9/api/pptx\nexport:\n  timeout_secs: 5\n",
    )
    .expect("Writing temp config failed");
    config
}

fn seed_session(path: &Path) {
    let mut deck = Deck::new("Board Update", None);
    let mut body = Slide::new(2, "Highlights");
    body.bullets = vec!["Revenue up".to_string(), "Churn down".to_string()];
    deck.slides = vec![Slide::new(1, "Board Update"), body];

    let mut store = DeckStore::new();
    store.set_deck(deck.clone());
    store.add_version(Version::snapshot(FIRST_VERSION_NAME, &deck));
    store.set_template(find_template("bell-enterprise"));
    save_session(path, &store).expect("Seeding session failed");
}

#[test]
fn templates_lists_builtin_templates() {
    deckwright()
        .arg("templates")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("bell-enterprise")
                .and(predicate::str::contains("internal-strategy"))
                .and(predicate::str::contains("quarterly-review")),
        );
}

#[test]
fn snapshot_without_deck_fails() {
    let dir = tempdir().unwrap();
    deckwright()
        .args(["snapshot", "--session"])
        .arg(dir.path().join("session.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("No deck in session"));
}

#[test]
fn snapshot_versions_and_restore_round_trip() {
    let dir = tempdir().unwrap();
    let session = dir.path().join("session.json");
    seed_session(&session);

    deckwright()
        .arg("snapshot")
        .arg("--session")
        .arg(&session)
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved Version 2"));

    let store = load_session(&session).unwrap();
    assert_eq!(store.versions().len(), 2);
    assert_eq!(store.versions()[0].name, "Version 2");
    let oldest = store.versions()[1].id.clone();

    deckwright()
        .arg("versions")
        .arg("--session")
        .arg(&session)
        .assert()
        .success()
        .stdout(predicate::str::contains(FIRST_VERSION_NAME));

    deckwright()
        .args(["compare", oldest.as_str(), "--session"])
        .arg(&session)
        .assert()
        .success()
        .stdout(predicate::str::contains("Comparing with Version 1"));

    deckwright()
        .args(["restore", oldest.as_str(), "--session"])
        .arg(&session)
        .assert()
        .success();

    deckwright()
        .args(["restore", "no-such-version", "--session"])
        .arg(&session)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown version"));
}

#[test]
fn show_prints_slides() {
    let dir = tempdir().unwrap();
    let session = dir.path().join("session.json");
    seed_session(&session);

    deckwright()
        .arg("show")
        .arg("--session")
        .arg(&session)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Board Update (2 slides)")
                .and(predicate::str::contains("2. Churn down")),
        );
}

#[test]
fn regenerate_requires_api_key() {
    let dir = tempdir().unwrap();
    let session = dir.path().join("session.json");
    seed_session(&session);
    let config = offline_config();

    deckwright()
        .args(["regenerate", "--slide", "2", "--config"])
        .arg(config.path())
        .arg("--session")
        .arg(&session)
        .assert()
        .failure()
        .stderr(predicate::str::contains("LLM_API_KEY"));
}

#[test]
fn regenerate_rejects_missing_slide() {
    let dir = tempdir().unwrap();
    let session = dir.path().join("session.json");
    seed_session(&session);

    deckwright()
        .args(["regenerate", "--slide", "9", "--session"])
        .arg(&session)
        .env("LLM_API_KEY", "unused")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Slide 9 does not exist"));
}

#[test]
fn export_falls_back_to_local_pdf_when_service_is_down() {
    let dir = tempdir().unwrap();
    let session = dir.path().join("session.json");
    let out = dir.path().join("out");
    seed_session(&session);
    let config = offline_config();

    deckwright()
        .arg("export")
        .arg("--config")
        .arg(config.path())
        .arg("--session")
        .arg(&session)
        .arg("--output-dir")
        .arg(&out)
        .args(["--internal-use-only", "false"])
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote local PDF"));

    let written: Vec<_> = std::fs::read_dir(&out)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(written.len(), 1);
    assert!(written[0].starts_with("Board Update_"));
    assert!(written[0].ends_with(".pdf"));
    assert!(!load_session(&session).unwrap().internal_use_only());
}

#[test]
fn reset_clears_session() {
    let dir = tempdir().unwrap();
    let session = dir.path().join("session.json");
    seed_session(&session);

    deckwright()
        .arg("reset")
        .arg("--session")
        .arg(&session)
        .assert()
        .success()
        .stdout(predicate::str::contains("Session cleared"));

    assert_eq!(load_session(&session).unwrap(), DeckStore::new());
}

#[test]
fn regenerate_rejects_bullet_zero() {
    let dir = tempdir().unwrap();
    let session = dir.path().join("session.json");
    seed_session(&session);

    deckwright()
        .args(["regenerate", "--slide", "2", "--bullet", "0", "--session"])
        .arg(&session)
        .env("LLM_API_KEY", "unused")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Bullet 0 does not exist"));
}

use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Records the `message` of every event.
struct MessageLog {
    messages: Arc<Mutex<Vec<String>>>,
}

struct MessageVisitor(Option<String>);

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.0 = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = Some(format!("{value:?}"));
        }
    }
}

impl<S> Layer<S> for MessageLog
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor(None);
        event.record(&mut visitor);
        if let Some(message) = visitor.0 {
            self.messages.lock().unwrap().push(message);
        }
    }
}

#[tokio::test]
async fn export_command_logs_its_phases() {
    use deckwright::cli::{run, Cli, Commands};

    let messages = Arc::new(Mutex::new(Vec::new()));
    let subscriber = Registry::default().with(MessageLog {
        messages: messages.clone(),
    });
    let _guard = tracing::subscriber::set_default(subscriber);

    let dir = tempdir().unwrap();
    let session = dir.path().join("session.json");
    seed_session(&session);
    let config = offline_config();

    let cli = Cli {
        config: Some(config.path().to_path_buf()),
        session,
        command: Commands::Export {
            output_dir: Some(dir.path().join("out")),
            internal_use_only: None,
        },
    };
    run(cli).await.expect("export falls back to a local PDF");

    let messages = messages.lock().unwrap();
    let position = |needle: &str| messages.iter().position(|m| m.contains(needle));
    let started = position("trace_initialised").expect("trace_initialised logged");
    let export = position("[EXPORT] Starting export").expect("export start logged");
    let fallback = position("[EXPORT] Template export failed").expect("fallback logged");
    let done = position("[EXPORT] Local export succeeded").expect("local export logged");
    assert!(started < export && export < fallback && fallback < done, "{messages:?}");
}
