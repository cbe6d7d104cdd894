//! Phraseboard: dwell-activation core for an AAC communication board
//!
//! This library provides the two tightly coupled subsystems behind a
//! phrase board for users with motor and speech impairments:
//! - A press-hold activation engine that turns a sustained touch into a
//!   debounced, cancellable "activated" signal (a quick tap-and-release
//!   is exactly the gesture the target users cannot perform reliably)
//! - A capacity-elastic, persistent phrase-slot store with duplicate
//!   prevention, safe overwrite semantics, and image-lifecycle management
//!
//! # Architecture
//!
//! ```text
//!   user gesture
//!        │
//!        ▼
//!   ┌──────────────────┐  progress / completed / cancelled
//!   │ PressHoldEngine  │ ─────────────────────────────────▶ UI / TTS
//!   └──────────────────┘
//!        │ confirmed action id (dispatched by the UI)
//!        ▼
//!   ┌──────────────────┐   snapshots    ┌───────────────┐
//!   │   PhraseStore    │ ──────────────▶│  observe_all  │
//!   └──────────────────┘                └───────────────┘
//!       │          │
//!       ▼          ▼
//!   KeyValueStore  BlobStore
//!   (slot array)   (slot images)
//! ```
//!
//! Every store mutation in a consuming UI is gated through a press-hold
//! confirmation; the store's capacity and fixed default slots shape which
//! activations the UI offers. Speech synthesis, theming, and image picking
//! stay in the UI layer; the store takes an already-picked source URI and
//! the engine emits events for anything that wants to react.

pub mod config;
pub mod error;
pub mod haptics;
pub mod press_hold;
pub mod storage;
pub mod store;
pub mod text;

pub use config::{
    ButtonSize, PhraseButtonConfig, PhraseButtonConfigStore, PressHoldConfig, PressHoldConfigPatch,
};
pub use error::{PhraseboardError, Result};
pub use haptics::{HapticFeedback, NullHaptics};
pub use press_hold::{PressHoldEngine, PressHoldEvent};
pub use storage::{BlobStore, FileBlobStore, FileKeyValueStore, KeyValueStore};
pub use store::{PhraseSlot, PhraseStore, SaveError, SaveOptions, SaveResult};
