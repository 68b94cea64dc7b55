//! Session persistence: the store's state as a JSON file between invocations.

use anyhow::{Context, Result};
use deckwright_core::store::{AppState, DeckStore};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

pub const DEFAULT_SESSION_FILE: &str = "deckwright-session.json";

/// Loads the session at `path`; a missing file is a fresh session.
pub fn load_session<P: AsRef<Path>>(path: P) -> Result<DeckStore> {
    let path = path.as_ref();
    if !path.exists() {
        debug!(path = %path.display(), "No session file, starting fresh");
        return Ok(DeckStore::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read session file {path:?}"))?;
    let state: AppState = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse session file {path:?}"))?;
    info!(
        path = %path.display(),
        has_deck = state.deck.is_some(),
        versions = state.versions.len(),
        "Loaded session"
    );
    Ok(DeckStore::from_state(state))
}

/// Writes the session atomically: a temp file in the same directory, then rename.
pub fn save_session<P: AsRef<Path>>(path: P, store: &DeckStore) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create session directory {dir:?}"))?;

    let json = serde_json::to_vec_pretty(store.state()).context("Failed to serialize session")?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {dir:?}"))?;
    tmp.write_all(&json).context("Failed to write session")?;
    tmp.persist(path)
        .with_context(|| format!("Failed to save session file {path:?}"))?;
    debug!(path = %path.display(), bytes = json.len(), "Saved session");
    Ok(())
}
