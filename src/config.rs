//! Configuration types and persisted settings stores
//!
//! Two settings surfaces live here:
//! - Press-hold behavior: a process-wide [`PressHoldConfig`] default that
//!   the activation engine snapshots at press start, plus a persisted
//!   hold-duration preference ([`HoldDurationStore`]).
//! - Board layout: [`PhraseButtonConfig`] (slot count + button size),
//!   persisted via the key-value backend ([`PhraseButtonConfigStore`]).
//!   Changing the count drives a store capacity migration.

use crate::storage::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// Storage key for the board layout config
const BUTTON_CONFIG_KEY: &str = "phrase-button-config";

/// Storage key for the persisted hold duration preference
const HOLD_DURATION_KEY: &str = "pressHoldDuration";

/// Slot counts the board supports
pub const AVAILABLE_BUTTON_COUNTS: [usize; 5] = [6, 12, 18, 24, 32];

/// Hold durations outside this range are rejected (ms)
pub const MIN_HOLD_DURATION_MS: u64 = 500;
pub const MAX_HOLD_DURATION_MS: u64 = 5000;

/// Default hold duration when no valid preference is persisted (ms)
pub const DEFAULT_HOLD_DURATION_MS: u64 = 500;

/// Visual size of a press-hold control
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ControlSize {
    Small,
    Default,
    #[default]
    Large,
}

/// Global press-hold behavior defaults
///
/// The engine snapshots this at `start_press_timer` time, merging in the
/// caller-supplied duration. Later global changes never affect a press
/// already in flight.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PressHoldConfig {
    /// How long the control must be held before it activates (ms)
    pub hold_duration_ms: u64,
    /// Render a progress indicator while holding
    pub show_progress: bool,
    /// Announce progress over TTS while holding
    pub announce_progress: bool,
    /// Pulse the vibration motor at press start and completion
    pub enable_haptic_feedback: bool,
    /// Interval between TTS progress announcements (ms, 0 = disabled)
    pub progress_announce_interval_ms: u64,
    /// Control color token (theme-defined, opaque to the engine)
    pub color: String,
    /// Progress indicator color token
    pub progress_color: Option<String>,
    /// Control size
    pub size: ControlSize,
}

impl Default for PressHoldConfig {
    fn default() -> Self {
        Self {
            hold_duration_ms: 3000,
            show_progress: true,
            announce_progress: false,
            enable_haptic_feedback: true,
            progress_announce_interval_ms: 0,
            color: "warning".to_string(),
            progress_color: Some("primary".to_string()),
            size: ControlSize::Large,
        }
    }
}

/// Partial override for [`PressHoldConfig`]
///
/// Every field is optional; [`PressHoldConfig::apply`] overwrites only the
/// fields that are present.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PressHoldConfigPatch {
    pub hold_duration_ms: Option<u64>,
    pub show_progress: Option<bool>,
    pub announce_progress: Option<bool>,
    pub enable_haptic_feedback: Option<bool>,
    pub progress_announce_interval_ms: Option<u64>,
    pub color: Option<String>,
    pub progress_color: Option<Option<String>>,
    pub size: Option<ControlSize>,
}

impl PressHoldConfig {
    /// Merge a partial override into this config, field-wise.
    pub fn apply(&mut self, patch: PressHoldConfigPatch) {
        if let Some(v) = patch.hold_duration_ms {
            self.hold_duration_ms = v;
        }
        if let Some(v) = patch.show_progress {
            self.show_progress = v;
        }
        if let Some(v) = patch.announce_progress {
            self.announce_progress = v;
        }
        if let Some(v) = patch.enable_haptic_feedback {
            self.enable_haptic_feedback = v;
        }
        if let Some(v) = patch.progress_announce_interval_ms {
            self.progress_announce_interval_ms = v;
        }
        if let Some(v) = patch.color {
            self.color = v;
        }
        if let Some(v) = patch.progress_color {
            self.progress_color = v;
        }
        if let Some(v) = patch.size {
            self.size = v;
        }
    }
}

/// Size of a phrase button on the board
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ButtonSize {
    Small,
    #[default]
    Medium,
    Large,
    Xlarge,
}

/// Board layout configuration: slot count and button size
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PhraseButtonConfig {
    /// Total slot count; one of [`AVAILABLE_BUTTON_COUNTS`]
    pub count: usize,
    /// Button size
    pub size: ButtonSize,
}

impl Default for PhraseButtonConfig {
    fn default() -> Self {
        Self {
            count: 12,
            size: ButtonSize::Medium,
        }
    }
}

impl PhraseButtonConfig {
    /// Whether `count` is one of the supported slot counts.
    pub fn is_valid_count(count: usize) -> bool {
        AVAILABLE_BUTTON_COUNTS.contains(&count)
    }
}

/// Column counts for laying the board out in each orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub portrait_cols: usize,
    pub landscape_cols: usize,
}

/// Xlarge buttons get their own layout regardless of count
const XLARGE_GRID_LAYOUT: GridLayout = GridLayout {
    portrait_cols: 1,
    landscape_cols: 2,
};

/// Grid layout for a slot count. Unknown counts fall back to the
/// 12-button layout.
pub fn grid_layout(count: usize) -> GridLayout {
    match count {
        6 | 12 => GridLayout {
            portrait_cols: 2,
            landscape_cols: 3,
        },
        18 => GridLayout {
            portrait_cols: 3,
            landscape_cols: 3,
        },
        24 => GridLayout {
            portrait_cols: 3,
            landscape_cols: 4,
        },
        32 => GridLayout {
            portrait_cols: 4,
            landscape_cols: 4,
        },
        _ => GridLayout {
            portrait_cols: 2,
            landscape_cols: 3,
        },
    }
}

/// Grid layout for a count and size. Xlarge overrides the count table.
pub fn grid_layout_for_size(count: usize, size: ButtonSize) -> GridLayout {
    if size == ButtonSize::Xlarge {
        XLARGE_GRID_LAYOUT
    } else {
        grid_layout(count)
    }
}

/// Persisted board layout configuration
///
/// Reads through the key-value backend once and caches; read failures fall
/// back to the default config (the board must come up even when storage is
/// unhappy). Writes update the cache and notify observers.
pub struct PhraseButtonConfigStore {
    kv: Arc<dyn KeyValueStore>,
    cached: Mutex<Option<PhraseButtonConfig>>,
    config_tx: watch::Sender<PhraseButtonConfig>,
}

impl PhraseButtonConfigStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        let (config_tx, _) = watch::channel(PhraseButtonConfig::default());
        Self {
            kv,
            cached: Mutex::new(None),
            config_tx,
        }
    }

    /// Current board config, loading it on first call.
    pub async fn config(&self) -> PhraseButtonConfig {
        let mut cached = self.cached.lock().await;
        if let Some(config) = *cached {
            return config;
        }

        let config = match self.kv.get(BUTTON_CONFIG_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<PhraseButtonConfig>(&raw) {
                Ok(parsed) if PhraseButtonConfig::is_valid_count(parsed.count) => parsed,
                Ok(parsed) => {
                    tracing::warn!(
                        "Persisted button count {} not supported, using default",
                        parsed.count
                    );
                    PhraseButtonConfig::default()
                }
                Err(e) => {
                    tracing::warn!("Failed to parse button config: {}", e);
                    PhraseButtonConfig::default()
                }
            },
            Ok(None) => PhraseButtonConfig::default(),
            Err(e) => {
                tracing::warn!("Failed to load button config: {}", e);
                PhraseButtonConfig::default()
            }
        };

        *cached = Some(config);
        self.config_tx.send_replace(config);
        config
    }

    /// Persist a new board config and notify observers.
    ///
    /// The cache advances even when the write fails; the new layout applies
    /// for this session and persistence is retried on the next change.
    pub async fn set_config(&self, config: PhraseButtonConfig) {
        let mut cached = self.cached.lock().await;
        match serde_json::to_string(&config) {
            Ok(json) => {
                if let Err(e) = self.kv.set(BUTTON_CONFIG_KEY, &json).await {
                    tracing::warn!("Failed to persist button config: {}", e);
                }
            }
            Err(e) => tracing::warn!("Failed to serialize button config: {}", e),
        }
        *cached = Some(config);
        self.config_tx.send_replace(config);
    }

    /// Watch the board config; replays the current value to new observers.
    pub fn observe_config(&self) -> watch::Receiver<PhraseButtonConfig> {
        self.config_tx.subscribe()
    }
}

/// Persisted hold-duration preference
///
/// Settings UIs adjust how long a press must be held; the value is clamped
/// to 500..=5000 ms and observable so open screens can pick up the change.
pub struct HoldDurationStore {
    kv: Arc<dyn KeyValueStore>,
    duration_tx: watch::Sender<u64>,
    loaded: Mutex<bool>,
}

impl HoldDurationStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        let (duration_tx, _) = watch::channel(DEFAULT_HOLD_DURATION_MS);
        Self {
            kv,
            duration_tx,
            loaded: Mutex::new(false),
        }
    }

    fn is_valid(duration_ms: u64) -> bool {
        (MIN_HOLD_DURATION_MS..=MAX_HOLD_DURATION_MS).contains(&duration_ms)
    }

    async fn ensure_loaded(&self) {
        let mut loaded = self.loaded.lock().await;
        if *loaded {
            return;
        }
        *loaded = true;

        match self.kv.get(HOLD_DURATION_KEY).await {
            Ok(Some(raw)) => match raw.trim().parse::<u64>() {
                Ok(ms) if Self::is_valid(ms) => {
                    self.duration_tx.send_replace(ms);
                }
                Ok(ms) => {
                    tracing::warn!("Persisted hold duration {}ms out of range, using default", ms);
                }
                Err(e) => {
                    tracing::warn!("Failed to parse hold duration: {}", e);
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("Failed to load hold duration: {}", e);
            }
        }
    }

    /// Current hold duration in milliseconds.
    pub async fn duration_ms(&self) -> u64 {
        self.ensure_loaded().await;
        *self.duration_tx.borrow()
    }

    /// Set and persist the hold duration. Out-of-range values are ignored.
    pub async fn set_duration_ms(&self, duration_ms: u64) {
        self.ensure_loaded().await;
        if !Self::is_valid(duration_ms) {
            tracing::warn!(
                "Rejected hold duration {}ms (allowed {}..={}ms)",
                duration_ms,
                MIN_HOLD_DURATION_MS,
                MAX_HOLD_DURATION_MS
            );
            return;
        }
        // send_replace updates the channel with or without receivers; the
        // channel is the value's home, not just a notification path
        self.duration_tx.send_replace(duration_ms);
        if let Err(e) = self.kv.set(HOLD_DURATION_KEY, &duration_ms.to_string()).await {
            tracing::warn!("Failed to persist hold duration: {}", e);
        }
    }

    /// Watch the hold duration; replays the current value to new observers.
    pub fn observe(&self) -> watch::Receiver<u64> {
        self.duration_tx.subscribe()
    }
}
