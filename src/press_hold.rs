//! Press-hold activation engine
//!
//! Converts a sustained touch into a debounced, cancellable "activated"
//! signal. Users who cannot perform a quick tap-and-release confirm an
//! action by holding a control for a configured duration instead; the
//! engine tracks one independent timer per logical button id, emits
//! progress ticks for the UI, and fires exactly one completion event when
//! the hold crosses 100%.
//!
//! All operations are synchronous state transitions; only the periodic
//! 50 ms tick runs as a scheduled task. Progress is recomputed from the
//! press start instant on every tick; completion is triggered by crossing
//! the threshold rather than by counting ticks, so clock drift never
//! accumulates beyond one tick interval.

use crate::config::{PressHoldConfig, PressHoldConfigPatch};
use crate::haptics::{HapticFeedback, ImpactStyle, NullHaptics};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};

/// How often hold progress is recomputed and published
pub const TICK_INTERVAL: Duration = Duration::from_millis(50);

/// Events emitted by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum PressHoldEvent {
    /// Hold in progress; emitted every tick until completion
    Progress {
        button_id: String,
        /// 0..=100
        progress: f32,
        duration_ms: u64,
    },
    /// Hold reached the configured duration; emitted exactly once
    Completed { button_id: String },
    /// Hold released or restarted before completion
    Cancelled {
        button_id: String,
        /// Last observed progress at the time of cancellation
        progress: f32,
    },
}

/// Live state for one held button. The press start instant lives in the
/// tick task, which recomputes progress from it on every tick.
struct ActiveHold {
    progress: f32,
    /// Config snapshot taken at press start; immune to later global changes
    config: PressHoldConfig,
    tick_task: Option<tokio::task::JoinHandle<()>>,
}

struct EngineInner {
    holds: HashMap<String, ActiveHold>,
    global_config: PressHoldConfig,
}

/// The press-hold activation engine
///
/// Cheap to clone via `Arc` internally; one instance serves every
/// press-hold control in the process. Requires a tokio runtime (tick tasks
/// are spawned on it).
pub struct PressHoldEngine {
    inner: Arc<Mutex<EngineInner>>,
    events: broadcast::Sender<PressHoldEvent>,
    haptics: Arc<dyn HapticFeedback>,
}

impl Default for PressHoldEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PressHoldEngine {
    /// Engine with no haptic device
    pub fn new() -> Self {
        Self::with_haptics(Arc::new(NullHaptics))
    }

    /// Engine wired to a platform haptic device
    pub fn with_haptics(haptics: Arc<dyn HapticFeedback>) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Mutex::new(EngineInner {
                holds: HashMap::new(),
                global_config: PressHoldConfig::default(),
            })),
            events,
            haptics,
        }
    }

    /// Subscribe to engine events. Receivers that fall behind miss old
    /// events; they never block the engine.
    pub fn subscribe(&self) -> broadcast::Receiver<PressHoldEvent> {
        self.events.subscribe()
    }

    /// Merge a partial override into the global defaults.
    ///
    /// Affects only future presses; holds already in flight keep the
    /// snapshot they started with.
    pub fn set_global_config(&self, patch: PressHoldConfigPatch) {
        let mut inner = self.inner.lock().unwrap();
        inner.global_config.apply(patch);
        tracing::debug!("Press-hold global config updated: {:?}", inner.global_config);
    }

    /// Current global defaults.
    pub fn global_config(&self) -> PressHoldConfig {
        self.inner.lock().unwrap().global_config.clone()
    }

    /// Begin a timed hold for `button_id`.
    ///
    /// An already-running timer for the same id is cancelled first
    /// (restart discards prior progress entirely). Completion happens
    /// automatically when the hold crosses 100%; the caller only needs to
    /// call [`cancel_press_timer`](Self::cancel_press_timer) on release.
    pub fn start_press_timer(&self, button_id: &str, duration_ms: u64) {
        self.cancel_press_timer(button_id);

        let config = {
            let inner = self.inner.lock().unwrap();
            let mut config = inner.global_config.clone();
            config.hold_duration_ms = duration_ms;
            config
        };

        if config.enable_haptic_feedback {
            if let Err(e) = self.haptics.impact(ImpactStyle::Light) {
                tracing::warn!("Start haptic unavailable: {}", e);
            }
        }

        let started_at = Instant::now();
        let haptic_on_complete = config.enable_haptic_feedback;
        self.inner.lock().unwrap().holds.insert(
            button_id.to_string(),
            ActiveHold {
                progress: 0.0,
                config,
                tick_task: None,
            },
        );

        let inner = Arc::clone(&self.inner);
        let events = self.events.clone();
        let haptics = Arc::clone(&self.haptics);
        let id = button_id.to_string();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(TICK_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
            // the first tick of an interval completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let elapsed_ms = started_at.elapsed().as_millis() as f32;
                let progress = (elapsed_ms / duration_ms as f32 * 100.0).min(100.0);

                let completed = {
                    let mut guard = inner.lock().unwrap();
                    match guard.holds.get_mut(&id) {
                        Some(hold) => {
                            hold.progress = progress;
                            progress >= 100.0
                        }
                        // cancelled while this tick was pending
                        None => return,
                    }
                };

                if completed {
                    if haptic_on_complete {
                        if let Err(e) = haptics.notify_success() {
                            tracing::warn!("Completion haptic unavailable: {}", e);
                        }
                    }
                    inner.lock().unwrap().holds.remove(&id);
                    tracing::debug!("Press-hold completed: {}", id);
                    let _ = events.send(PressHoldEvent::Completed { button_id: id });
                    return;
                }

                let _ = events.send(PressHoldEvent::Progress {
                    button_id: id.clone(),
                    progress,
                    duration_ms,
                });
            }
        });
        if let Some(hold) = self.inner.lock().unwrap().holds.get_mut(button_id) {
            hold.tick_task = Some(task);
        }
    }

    /// Cancel the hold for `button_id`, if any.
    ///
    /// Safe to call for ids with no active hold, repeatedly, and after the
    /// press already auto-completed; all of those are no-ops. Completion
    /// always wins once fired.
    pub fn cancel_press_timer(&self, button_id: &str) {
        let removed = self.inner.lock().unwrap().holds.remove(button_id);
        if let Some(hold) = removed {
            if let Some(task) = hold.tick_task {
                task.abort();
            }
            tracing::debug!(
                "Press-hold cancelled: {} at {:.0}%",
                button_id,
                hold.progress
            );
            let _ = self.events.send(PressHoldEvent::Cancelled {
                button_id: button_id.to_string(),
                progress: hold.progress,
            });
        }
    }

    /// Whether an active (non-completed) hold exists for `button_id`.
    pub fn is_pressing(&self, button_id: &str) -> bool {
        self.inner.lock().unwrap().holds.contains_key(button_id)
    }

    /// Current progress for `button_id` in 0..=100, or 0 with no active
    /// hold. Never fails.
    pub fn progress(&self, button_id: &str) -> f32 {
        self.inner
            .lock()
            .unwrap()
            .holds
            .get(button_id)
            .map(|hold| hold.progress)
            .unwrap_or(0.0)
    }

    /// The config snapshot an active hold is running with, for UI
    /// rendering (progress bar, colors). `None` when no hold is active.
    pub fn press_config(&self, button_id: &str) -> Option<PressHoldConfig> {
        self.inner
            .lock()
            .unwrap()
            .holds
            .get(button_id)
            .map(|hold| hold.config.clone())
    }
}
