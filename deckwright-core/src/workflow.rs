//! Orchestration between the store and the async services.
//!
//! A field edit runs in three steps so the store is never touched while a
//! request is pending:
//!   - `prepare` reads the slide, captures its id plus the context, and claims
//!     the field in the [`InFlightTracker`]
//!   - `run` awaits the service
//!   - `apply` looks the slide up again by id and writes the result, or does
//!     nothing when the slide or bullet is gone
//!
//! The claim is released when the edit is applied or dropped.

use futures::future::join_all;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::contract::CompletionClient;
use crate::error::{EditError, GenerationError};
use crate::generate::DeckGenerator;
use crate::model::{SlidePatch, Version};
use crate::regenerate::{bullet_context, title_context, Regenerator};
use crate::store::{DeckStore, FIRST_VERSION_NAME};

/// A single regenerable field, addressed by stable slide id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKey {
    Title { slide_id: u32 },
    Bullet { slide_id: u32, index: usize },
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKey::Title { slide_id } => write!(f, "title of slide {slide_id}"),
            FieldKey::Bullet { slide_id, index } => {
                write!(f, "bullet {index} of slide {slide_id}")
            }
        }
    }
}

/// Set of fields with a request in flight. Clones share the same set.
#[derive(Debug, Clone, Default)]
pub struct InFlightTracker {
    pending: Arc<Mutex<HashSet<FieldKey>>>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<FieldKey>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Claims `key`. Returns `None` while another claim on the same key is held.
    pub fn begin(&self, key: FieldKey) -> Option<InFlightGuard> {
        if !self.lock().insert(key) {
            debug!(%key, "Field already in flight");
            return None;
        }
        Some(InFlightGuard {
            key,
            pending: Arc::clone(&self.pending),
        })
    }

    pub fn is_pending(&self, key: FieldKey) -> bool {
        self.lock().contains(&key)
    }

    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }
}

/// Releases its key when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    key: FieldKey,
    pending: Arc<Mutex<HashSet<FieldKey>>>,
}

impl InFlightGuard {
    pub fn key(&self) -> FieldKey {
        self.key
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.key);
    }
}

/// A pending title rewrite.
#[derive(Debug)]
pub struct TitleEdit {
    slide_id: u32,
    context: String,
    current: String,
    _guard: InFlightGuard,
}

impl TitleEdit {
    pub fn prepare(
        store: &DeckStore,
        tracker: &InFlightTracker,
        slide_index: usize,
    ) -> Result<Self, EditError> {
        let slide = current_slide(store, slide_index)?;
        let key = FieldKey::Title { slide_id: slide.id };
        let guard = tracker.begin(key).ok_or(EditError::InFlight(key))?;
        Ok(Self {
            slide_id: slide.id,
            context: title_context(slide),
            current: slide.title.clone(),
            _guard: guard,
        })
    }

    pub fn slide_id(&self) -> u32 {
        self.slide_id
    }

    pub async fn run<C: CompletionClient>(&self, regenerator: &Regenerator<C>) -> String {
        regenerator
            .regenerate_title(&self.context, &self.current)
            .await
    }

    /// Writes `title` if the slide still exists. Returns whether it was written.
    pub fn apply(self, store: &mut DeckStore, title: String) -> bool {
        let Some(position) = store.slide_position(self.slide_id) else {
            warn!(slide_id = self.slide_id, "Slide removed during regeneration, discarding title");
            return false;
        };
        store.update_slide(position, SlidePatch::default().title(title));
        true
    }
}

/// A pending rewrite of one bullet.
#[derive(Debug)]
pub struct BulletEdit {
    slide_id: u32,
    index: usize,
    context: String,
    current: String,
    _guard: InFlightGuard,
}

impl BulletEdit {
    pub fn prepare(
        store: &DeckStore,
        tracker: &InFlightTracker,
        slide_index: usize,
        bullet_index: usize,
    ) -> Result<Self, EditError> {
        let slide = current_slide(store, slide_index)?;
        let current = slide
            .bullets
            .get(bullet_index)
            .ok_or(EditError::NoBullet {
                slide_id: slide.id,
                index: bullet_index,
            })?
            .clone();
        let key = FieldKey::Bullet {
            slide_id: slide.id,
            index: bullet_index,
        };
        let guard = tracker.begin(key).ok_or(EditError::InFlight(key))?;
        Ok(Self {
            slide_id: slide.id,
            index: bullet_index,
            context: bullet_context(slide, bullet_index),
            current,
            _guard: guard,
        })
    }

    pub fn key(&self) -> FieldKey {
        FieldKey::Bullet {
            slide_id: self.slide_id,
            index: self.index,
        }
    }

    pub async fn run<C: CompletionClient>(&self, regenerator: &Regenerator<C>) -> String {
        regenerator
            .regenerate_bullet(&self.context, &self.current)
            .await
    }

    /// Writes `bullet` if the slide and bullet index still exist.
    pub fn apply(self, store: &mut DeckStore, bullet: String) -> bool {
        let Some(position) = store.slide_position(self.slide_id) else {
            warn!(slide_id = self.slide_id, "Slide removed during regeneration, discarding bullet");
            return false;
        };
        let Some(mut bullets) = store.slide(position).map(|s| s.bullets.clone()) else {
            return false;
        };
        let Some(slot) = bullets.get_mut(self.index) else {
            warn!(
                slide_id = self.slide_id,
                index = self.index,
                "Bullet removed during regeneration, discarding"
            );
            return false;
        };
        *slot = bullet;
        store.update_slide(position, SlidePatch::default().bullets(bullets));
        true
    }
}

/// A pending request for an extra bullet. Not tracked: each request appends.
#[derive(Debug)]
pub struct NewBulletEdit {
    slide_id: u32,
    context: String,
    existing: Vec<String>,
}

impl NewBulletEdit {
    pub fn prepare(store: &DeckStore, slide_index: usize) -> Result<Self, EditError> {
        let slide = current_slide(store, slide_index)?;
        Ok(Self {
            slide_id: slide.id,
            context: slide.title.clone(),
            existing: slide.visible_bullets().map(str::to_string).collect(),
        })
    }

    pub async fn run<C: CompletionClient>(&self, regenerator: &Regenerator<C>) -> String {
        regenerator
            .generate_new_bullet(&self.context, &self.existing)
            .await
    }

    pub fn apply(self, store: &mut DeckStore, bullet: String) -> bool {
        let Some(position) = store.slide_position(self.slide_id) else {
            return false;
        };
        let Some(mut bullets) = store.slide(position).map(|s| s.bullets.clone()) else {
            return false;
        };
        bullets.push(bullet);
        store.update_slide(position, SlidePatch::default().bullets(bullets));
        true
    }
}

fn current_slide(store: &DeckStore, index: usize) -> Result<&crate::model::Slide, EditError> {
    let deck = store.deck().ok_or(EditError::NoDeck)?;
    deck.slides.get(index).ok_or(EditError::NoSlide(index))
}

/// Rewrites every bullet of a slide concurrently and applies the results.
/// Bullets already in flight are skipped. Returns how many were written.
pub async fn regenerate_all_bullets<C: CompletionClient>(
    store: &mut DeckStore,
    tracker: &InFlightTracker,
    regenerator: &Regenerator<C>,
    slide_index: usize,
) -> Result<usize, EditError> {
    let view: &DeckStore = store;
    let count = current_slide(view, slide_index)?.bullets.len();
    let edits: Vec<BulletEdit> = (0..count)
        .filter_map(|i| match BulletEdit::prepare(view, tracker, slide_index, i) {
            Ok(edit) => Some(edit),
            Err(e) => {
                debug!(error = %e, "Skipping bullet");
                None
            }
        })
        .collect();

    let results = join_all(edits.iter().map(|edit| edit.run(regenerator))).await;

    let mut written = 0;
    for (edit, bullet) in edits.into_iter().zip(results) {
        if edit.apply(store, bullet) {
            written += 1;
        }
    }
    info!(slide_index, written, "Regenerated bullets");
    Ok(written)
}

/// Generates a deck from the store's upload queue and selected template, makes
/// it current and records the first version. The store is untouched on failure.
pub async fn generate_into_store<C, F>(
    store: &mut DeckStore,
    generator: &DeckGenerator<C>,
    progress: F,
) -> Result<(), GenerationError>
where
    C: CompletionClient,
    F: FnMut(u8, &str),
{
    let files = store.uploaded_files().to_vec();
    let template = store.selected_template().cloned();
    let deck = generator
        .generate(&files, template.as_ref(), progress)
        .await?;
    let version = Version::snapshot(FIRST_VERSION_NAME, &deck);
    store.set_deck(deck);
    store.add_version(version);
    Ok(())
}
