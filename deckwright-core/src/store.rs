//! Deck/version store: the single owner of application state.
//!
//! All reads and writes of the current deck, the version log and the session
//! settings go through [`DeckStore`]. Mutation is synchronous and takes
//! `&mut self`; async callers apply their results only after the service call
//! has settled (see [`crate::workflow`]).
//!
//! # Invariants
//! - `update_slide` never changes a slide's id or position.
//! - The version log is append-only and newest-first; versions are deep copies.
//! - `reset` is the only teardown path and restores [`AppState::default`].

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ingest::UploadedFile;
use crate::model::{Deck, Slide, SlidePatch, TemplateDescriptor, Version};

pub const DEFAULT_TEMPLATE_THEME: &str = "bell-enterprise";
pub const FIRST_VERSION_NAME: &str = "Version 1 - AI Generated";
pub const NEW_SLIDE_TITLE: &str = "New Slide";

/// Everything the wizard remembers between steps. Serializable as a session file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppState {
    pub deck: Option<Deck>,
    /// Newest first.
    pub versions: Vec<Version>,
    pub compare_version_id: Option<String>,
    pub internal_use_only: bool,
    pub current_slide_index: usize,
    pub uploaded_files: Vec<UploadedFile>,
    pub selected_template: Option<TemplateDescriptor>,
    pub template_theme: String,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            deck: None,
            versions: Vec::new(),
            compare_version_id: None,
            internal_use_only: true,
            current_slide_index: 0,
            uploaded_files: Vec::new(),
            selected_template: None,
            template_theme: DEFAULT_TEMPLATE_THEME.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeckStore {
    state: AppState,
}

impl DeckStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn into_state(self) -> AppState {
        self.state
    }

    pub fn deck(&self) -> Option<&Deck> {
        self.state.deck.as_ref()
    }

    pub fn versions(&self) -> &[Version] {
        &self.state.versions
    }

    pub fn uploaded_files(&self) -> &[UploadedFile] {
        &self.state.uploaded_files
    }

    pub fn selected_template(&self) -> Option<&TemplateDescriptor> {
        self.state.selected_template.as_ref()
    }

    pub fn template_theme(&self) -> &str {
        &self.state.template_theme
    }

    pub fn internal_use_only(&self) -> bool {
        self.state.internal_use_only
    }

    pub fn current_slide_index(&self) -> usize {
        self.state.current_slide_index
    }

    pub fn compare_version_id(&self) -> Option<&str> {
        self.state.compare_version_id.as_deref()
    }

    // --- Upload queue ---

    pub fn add_file(&mut self, file: UploadedFile) {
        debug!(file = %file.name, "Queued upload");
        self.state.uploaded_files.push(file);
    }

    /// Removes the file at `index`; an out-of-range index leaves the queue untouched.
    pub fn remove_file(&mut self, index: usize) -> Option<UploadedFile> {
        if index < self.state.uploaded_files.len() {
            Some(self.state.uploaded_files.remove(index))
        } else {
            None
        }
    }

    pub fn clear_files(&mut self) {
        self.state.uploaded_files.clear();
    }

    // --- Template ---

    pub fn set_template(&mut self, template: Option<TemplateDescriptor>) {
        self.state.selected_template = template;
    }

    pub fn set_template_theme(&mut self, theme: impl Into<String>) {
        self.state.template_theme = theme.into();
    }

    // --- Deck ---

    /// Replaces the deck wholesale.
    pub fn set_deck(&mut self, deck: Deck) {
        info!(deck_id = %deck.id, slides = deck.slides.len(), "Deck replaced");
        self.state.deck = Some(deck);
    }

    /// Merges `patch` into the slide at `index`, leaving every other slide as is.
    ///
    /// # Panics
    /// If there is no deck or `index` is out of range. Callers resolve the
    /// index from the current deck first (see [`DeckStore::slide_position`]).
    pub fn update_slide(&mut self, index: usize, patch: SlidePatch) {
        let deck = self
            .state
            .deck
            .as_mut()
            .unwrap_or_else(|| panic!("update_slide({index}) called without a deck"));
        let len = deck.slides.len();
        let slide = deck
            .slides
            .get_mut(index)
            .unwrap_or_else(|| panic!("update_slide index {index} out of range for {len} slides"));
        patch.apply_to(slide);
        debug!(index, slide_id = slide.id, "Slide updated");
    }

    /// Index of the slide with `slide_id` in the current deck.
    pub fn slide_position(&self, slide_id: u32) -> Option<usize> {
        self.deck()?.slides.iter().position(|s| s.id == slide_id)
    }

    pub fn slide(&self, index: usize) -> Option<&Slide> {
        self.deck()?.slides.get(index)
    }

    /// Appends a blank slide with a fresh id and returns that id.
    pub fn add_slide(&mut self) -> Option<u32> {
        let deck = self.state.deck.as_mut()?;
        let id = deck.next_slide_id();
        deck.slides.push(Slide::new(id, NEW_SLIDE_TITLE));
        debug!(slide_id = id, "Slide added");
        Some(id)
    }

    /// Moves the slide at `from` so it ends up at `to`. Returns false when
    /// either index is out of range.
    pub fn move_slide(&mut self, from: usize, to: usize) -> bool {
        let Some(deck) = self.state.deck.as_mut() else {
            return false;
        };
        if from >= deck.slides.len() || to >= deck.slides.len() {
            return false;
        }
        let slide = deck.slides.remove(from);
        deck.slides.insert(to, slide);
        true
    }

    // --- Versions ---

    /// Prepends `version` to the log.
    pub fn add_version(&mut self, version: Version) {
        info!(version_id = %version.id, name = %version.name, "Version saved");
        self.state.versions.insert(0, version);
    }

    /// Snapshots the current deck as `Version {n}`; `None` without a deck.
    pub fn save_snapshot(&mut self) -> Option<&Version> {
        let deck = self.state.deck.as_ref()?;
        let version = Version::snapshot(format!("Version {}", self.state.versions.len() + 1), deck);
        self.add_version(version);
        self.state.versions.first()
    }

    pub fn version(&self, version_id: &str) -> Option<&Version> {
        self.state.versions.iter().find(|v| v.id == version_id)
    }

    /// Makes a copy of the version's deck current. Returns false for an unknown id.
    pub fn restore_version(&mut self, version_id: &str) -> bool {
        match self.version(version_id).map(|v| v.deck.clone()) {
            Some(deck) => {
                info!(version_id, "Restoring version");
                self.set_deck(deck);
                true
            }
            None => false,
        }
    }

    /// Sets the compare pointer. The id is not validated.
    pub fn set_compare_version(&mut self, version_id: Option<String>) {
        self.state.compare_version_id = version_id;
    }

    /// The version being compared against; `None` when unset or dangling.
    pub fn compare_version(&self) -> Option<&Version> {
        self.version(self.state.compare_version_id.as_deref()?)
    }

    pub fn compare_slide(&self, index: usize) -> Option<&Slide> {
        self.compare_version()?.deck.slides.get(index)
    }

    // --- Settings ---

    pub fn set_internal_use_only(&mut self, value: bool) {
        self.state.internal_use_only = value;
    }

    pub fn set_current_slide_index(&mut self, index: usize) {
        self.state.current_slide_index = index;
    }

    /// Restores every field to its initial value.
    pub fn reset(&mut self) {
        info!("Resetting application state");
        self.state = AppState::default();
    }
}
