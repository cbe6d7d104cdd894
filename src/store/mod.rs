//! Phrase slot store: the single source of truth for board content
//!
//! Owns the canonical slot array: exactly `capacity` slots at all times,
//! indices contiguous from 0. Mutations validate (range, empty text,
//! duplicates), apply in memory, persist best-effort through the
//! key-value backend, and publish the new snapshot to watchers. Image
//! blobs are singly-owned by their slot; replacing or removing an image
//! deletes the previously owned blob.
//!
//! The array is lazily loaded on first access. Older persisted formats
//! (a plain string array) are upgraded transparently, and a backend with
//! no prior data gets the built-in default phrases seeded once.

pub mod defaults;

use crate::error::{Result, StorageError};
use crate::storage::{BlobStore, KeyValueStore};
use crate::text;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// Storage key for the slot-record array
pub const STORAGE_KEY: &str = "phrase-slots";

/// Legacy storage key holding a plain string array
pub const LEGACY_STORAGE_KEY: &str = "saved-phrases-12";

/// One communication-board cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhraseSlot {
    /// Immutable identity; always equals the slot's array position
    pub index: usize,
    /// Normalized phrase text; empty means unassigned
    #[serde(default)]
    pub value: String,
    /// Owned image blob URI; absent slots display their number instead
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_uri: Option<String>,
    /// Accessible description spoken for the image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_alt_text: Option<String>,
}

impl PhraseSlot {
    fn empty(index: usize) -> Self {
        Self {
            index,
            value: String::new(),
            image_uri: None,
            image_alt_text: None,
        }
    }

    /// Whether this slot has no phrase assigned
    pub fn is_unassigned(&self) -> bool {
        self.value.is_empty()
    }
}

/// Why a save was rejected
///
/// `Duplicate` deliberately covers two situations the UI distinguishes by
/// the presence of `duplicate_index` on the result: the text already lives
/// in another slot (index present, user must pick different text), or the
/// target slot is occupied and `overwrite` was not requested (index
/// absent, UI asks for confirmation and retries with `overwrite`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveError {
    Empty,
    Duplicate,
    IndexOutOfRange,
}

/// Structured outcome of [`PhraseStore::save_at`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveResult {
    pub ok: bool,
    pub error: Option<SaveError>,
    pub duplicate_index: Option<usize>,
}

impl SaveResult {
    fn saved() -> Self {
        Self {
            ok: true,
            error: None,
            duplicate_index: None,
        }
    }

    fn rejected(error: SaveError) -> Self {
        Self {
            ok: false,
            error: Some(error),
            duplicate_index: None,
        }
    }

    fn duplicate_at(index: usize) -> Self {
        Self {
            ok: false,
            error: Some(SaveError::Duplicate),
            duplicate_index: Some(index),
        }
    }
}

/// Options for [`PhraseStore::save_at`]
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Replace an occupied slot without a confirmation round-trip
    pub overwrite: bool,
    /// Image URI to store alongside the phrase (stored verbatim; use
    /// [`PhraseStore::set_image_at`] for gallery images needing blob
    /// persistence)
    pub image_uri: Option<String>,
    /// Accessible description for the image
    pub image_alt_text: Option<String>,
}

struct StoreState {
    slots: Vec<PhraseSlot>,
    loaded: bool,
}

/// The phrase slot store
pub struct PhraseStore {
    kv: Arc<dyn KeyValueStore>,
    blobs: Arc<dyn BlobStore>,
    state: Mutex<StoreState>,
    snapshot_tx: watch::Sender<Vec<PhraseSlot>>,
    capacity: AtomicUsize,
}

impl PhraseStore {
    /// Create a store over the given backends with an initial capacity
    /// (driven by the board's `PhraseButtonConfig.count`). No IO happens
    /// until the first operation touches slot data.
    pub fn new(kv: Arc<dyn KeyValueStore>, blobs: Arc<dyn BlobStore>, capacity: usize) -> Self {
        let slots: Vec<PhraseSlot> = (0..capacity).map(PhraseSlot::empty).collect();
        let (snapshot_tx, _) = watch::channel(slots.clone());
        Self {
            kv,
            blobs,
            state: Mutex::new(StoreState {
                slots,
                loaded: false,
            }),
            snapshot_tx,
            capacity: AtomicUsize::new(capacity),
        }
    }

    /// Current slot capacity. Synchronous so UI layers can read it without
    /// awaiting; only [`update_capacity`](Self::update_capacity) changes it.
    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::SeqCst)
    }

    /// Watch the slot array; new subscribers immediately receive the
    /// current snapshot, then every successful mutation.
    pub fn observe_all(&self) -> watch::Receiver<Vec<PhraseSlot>> {
        self.snapshot_tx.subscribe()
    }

    /// Collapse whitespace runs and trim. See [`text::normalize`].
    pub fn normalize(&self, phrase: &str) -> String {
        text::normalize(phrase)
    }

    /// All slots, loading the store on first call.
    pub async fn get_all(&self) -> Vec<PhraseSlot> {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state).await;
        state.slots.clone()
    }

    /// Index of the slot whose non-empty value equals `phrase` after
    /// normalization and case folding, if any.
    pub async fn find_duplicate_index(&self, phrase: &str) -> Option<usize> {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state).await;
        Self::scan_duplicate(&state.slots, &text::normalized_key(phrase))
    }

    /// Save a phrase into a slot.
    ///
    /// Validation ladder: range → empty → cross-slot duplicate (the target
    /// index is exempt from matching itself, so re-saving a slot is
    /// idempotent) → occupied target without `overwrite`. On success the
    /// phrase is stored normalized; image fields are replaced only when
    /// supplied in `opts`.
    pub async fn save_at(&self, index: usize, phrase: &str, opts: SaveOptions) -> SaveResult {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state).await;

        if index >= state.slots.len() {
            return SaveResult::rejected(SaveError::IndexOutOfRange);
        }
        let norm = text::normalize(phrase);
        if norm.is_empty() {
            return SaveResult::rejected(SaveError::Empty);
        }

        if let Some(dup) = Self::scan_duplicate(&state.slots, &text::normalized_key(&norm)) {
            if dup != index {
                return SaveResult::duplicate_at(dup);
            }
        }

        if !state.slots[index].is_unassigned() && !opts.overwrite {
            // occupied target: the UI confirms, then retries with overwrite
            return SaveResult::rejected(SaveError::Duplicate);
        }

        let slot = &mut state.slots[index];
        slot.value = norm;
        if opts.image_uri.is_some() {
            slot.image_uri = opts.image_uri;
        }
        if opts.image_alt_text.is_some() {
            slot.image_alt_text = opts.image_alt_text;
        }

        self.persist_and_publish(&state).await;
        SaveResult::saved()
    }

    /// Reset a slot to unassigned, deleting its owned image blob.
    /// Out-of-range indices are a silent no-op.
    pub async fn remove_at(&self, index: usize) {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state).await;
        if index >= state.slots.len() {
            return;
        }

        if let Some(uri) = state.slots[index].image_uri.take() {
            self.blobs.delete_image(&uri).await;
        }
        state.slots[index] = PhraseSlot::empty(index);
        self.persist_and_publish(&state).await;
    }

    /// Reset every slot, deleting all owned image blobs.
    pub async fn clear_all(&self) {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state).await;

        for slot in &state.slots {
            if let Some(ref uri) = slot.image_uri {
                self.blobs.delete_image(uri).await;
            }
        }
        let capacity = state.slots.len();
        state.slots = (0..capacity).map(PhraseSlot::empty).collect();
        self.persist_and_publish(&state).await;
    }

    /// Attach an image to a slot.
    ///
    /// The previously owned blob is deleted first, then the new source is
    /// persisted through the blob store (delete-then-write keeps every
    /// blob singly-owned). Passing the slot's current URI back updates
    /// only the alt text, with no blob work; that is how alt-text edits
    /// arrive from the UI. Out-of-range indices are a no-op.
    pub async fn set_image_at(
        &self,
        index: usize,
        source_uri: &str,
        alt_text: Option<String>,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state).await;
        if index >= state.slots.len() {
            tracing::debug!("set_image_at({}) out of range, ignoring", index);
            return Ok(());
        }

        if state.slots[index].image_uri.as_deref() == Some(source_uri) {
            state.slots[index].image_alt_text = alt_text;
            self.persist_and_publish(&state).await;
            return Ok(());
        }

        if let Some(old) = state.slots[index].image_uri.take() {
            self.blobs.delete_image(&old).await;
        }

        match self.blobs.save_image_from_source(source_uri).await {
            Ok(persisted) => {
                let slot = &mut state.slots[index];
                slot.image_uri = Some(persisted);
                slot.image_alt_text = alt_text;
                self.persist_and_publish(&state).await;
                Ok(())
            }
            Err(e) => {
                // the old blob is already gone; leave the slot imageless
                // rather than dangling
                state.slots[index].image_alt_text = None;
                self.persist_and_publish(&state).await;
                Err(e.into())
            }
        }
    }

    /// Detach and delete a slot's image. Out-of-range indices are a no-op.
    pub async fn remove_image_at(&self, index: usize) {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state).await;
        if index >= state.slots.len() {
            return;
        }

        if let Some(uri) = state.slots[index].image_uri.take() {
            self.blobs.delete_image(&uri).await;
        }
        state.slots[index].image_alt_text = None;
        self.persist_and_publish(&state).await;
    }

    /// Resize the slot array.
    ///
    /// Shrinking with `delete_surplus` deletes the surplus slots' image
    /// blobs; without it the slots are dropped but their blobs kept, so
    /// growing again can restore them from a backup or the user accepts
    /// the orphans as the price of an undo path. Growing appends empty
    /// slots. Indices stay contiguous either way.
    pub async fn update_capacity(&self, new_capacity: usize, delete_surplus: bool) {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state).await;

        let current = state.slots.len();
        if new_capacity < current {
            if delete_surplus {
                for slot in &state.slots[new_capacity..] {
                    if let Some(ref uri) = slot.image_uri {
                        self.blobs.delete_image(uri).await;
                    }
                }
            }
            state.slots.truncate(new_capacity);
        } else {
            for i in current..new_capacity {
                state.slots.push(PhraseSlot::empty(i));
            }
        }
        for (i, slot) in state.slots.iter_mut().enumerate() {
            slot.index = i;
        }

        self.capacity.store(new_capacity, Ordering::SeqCst);
        tracing::info!(
            "Slot capacity changed {} -> {} (delete_surplus={})",
            current,
            new_capacity,
            delete_surplus
        );
        self.persist_and_publish(&state).await;
    }

    fn scan_duplicate(slots: &[PhraseSlot], key: &str) -> Option<usize> {
        slots
            .iter()
            .position(|s| !s.value.is_empty() && s.value.to_lowercase() == key)
    }

    /// Load-once guard. Must be called with the state lock held; the lock
    /// also makes concurrent first calls take turns, so the load runs once.
    async fn ensure_loaded(&self, state: &mut StoreState) {
        if state.loaded {
            return;
        }
        state.loaded = true;
        self.load(state).await;
        self.snapshot_tx.send_replace(state.slots.clone());
    }

    async fn load(&self, state: &mut StoreState) {
        let capacity = state.slots.len();

        let raw = match self.kv.get(STORAGE_KEY).await {
            Ok(Some(raw)) => Some(raw),
            Ok(None) => match self.kv.get(LEGACY_STORAGE_KEY).await {
                Ok(found) => found,
                Err(e) => {
                    tracing::warn!("Failed to read legacy phrase data: {}", e);
                    return;
                }
            },
            Err(e) => {
                // serve the empty defaults; do not persist over whatever
                // the backend may still hold
                tracing::warn!("Failed to read phrase data, serving defaults: {}", e);
                return;
            }
        };

        match raw.as_deref().and_then(Self::parse_slots) {
            Some(mut slots) => {
                // normalize values and force the array back to capacity
                for slot in &mut slots {
                    slot.value = text::normalize(&slot.value);
                }
                slots.truncate(capacity);
                while slots.len() < capacity {
                    slots.push(PhraseSlot::empty(slots.len()));
                }
                for (i, slot) in slots.iter_mut().enumerate() {
                    slot.index = i;
                }
                state.slots = slots;
            }
            None if raw.is_some() => {
                // unreadable existing data: serve an empty board but do
                // not write over whatever is there
                tracing::warn!("Unreadable phrase data, serving empty board");
            }
            None => {
                // first run ever: seed the built-in phrases
                defaults::seed(&mut state.slots);
                self.persist(&state.slots).await;
            }
        }
    }

    /// Accept the current slot-record format or the legacy plain string
    /// array, upgrading the latter.
    fn parse_slots(raw: &str) -> Option<Vec<PhraseSlot>> {
        if let Ok(slots) = serde_json::from_str::<Vec<PhraseSlot>>(raw) {
            return Some(slots);
        }
        if let Ok(values) = serde_json::from_str::<Vec<String>>(raw) {
            return Some(
                values
                    .into_iter()
                    .enumerate()
                    .map(|(index, value)| PhraseSlot {
                        index,
                        value,
                        image_uri: None,
                        image_alt_text: None,
                    })
                    .collect(),
            );
        }
        None
    }

    async fn persist(&self, slots: &[PhraseSlot]) {
        match serde_json::to_string(slots) {
            Ok(json) => {
                if let Err(e) = self.kv.set(STORAGE_KEY, &json).await {
                    // in-memory state is now ahead of disk; the next
                    // successful write catches it up
                    tracing::warn!("Failed to persist phrases: {}", e);
                }
            }
            Err(e) => {
                let e = StorageError::Serialize(e.to_string());
                tracing::warn!("Failed to persist phrases: {}", e);
            }
        }
    }

    async fn persist_and_publish(&self, state: &StoreState) {
        self.persist(&state.slots).await;
        // send_replace keeps the channel current even with no receivers,
        // so late subscribers still get this snapshot
        self.snapshot_tx.send_replace(state.slots.clone());
    }
}
