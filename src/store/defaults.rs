//! Built-in default phrases
//!
//! A brand-new board is seeded with six essential phrases so the user can
//! communicate immediately, before anyone configures anything. The first
//! six slots are treated as fixed by consuming UIs: they can be spoken but
//! their mutation controls are hidden. Seeding happens only when the
//! backend held no prior data; `restore_defaults` re-applies the set on an
//! explicit user request.

use super::{PhraseSlot, PhraseStore, SaveOptions};
use crate::text;

/// One built-in phrase with its icon
#[derive(Debug, Clone, Copy)]
pub struct DefaultPhrase {
    pub slot: usize,
    pub text: &'static str,
    pub icon_uri: &'static str,
    pub alt_text: &'static str,
}

/// Slots 0..FIXED_SLOT_COUNT are reserved for the built-in phrases
pub const FIXED_SLOT_COUNT: usize = 6;

/// The built-in phrase set
pub const DEFAULT_PHRASES: [DefaultPhrase; FIXED_SLOT_COUNT] = [
    DefaultPhrase {
        slot: 0,
        text: "YES",
        icon_uri: "assets/default-icons/check.svg",
        alt_text: "Yes",
    },
    DefaultPhrase {
        slot: 1,
        text: "NO",
        icon_uri: "assets/default-icons/no.svg",
        alt_text: "No",
    },
    DefaultPhrase {
        slot: 2,
        text: "I am hungry",
        icon_uri: "assets/default-icons/eating.svg",
        alt_text: "Food",
    },
    DefaultPhrase {
        slot: 3,
        text: "I want to go to the bathroom",
        icon_uri: "assets/default-icons/bathroom.svg",
        alt_text: "Bathroom",
    },
    DefaultPhrase {
        slot: 4,
        text: "I am not feeling well",
        icon_uri: "assets/default-icons/health.svg",
        alt_text: "Health",
    },
    DefaultPhrase {
        slot: 5,
        text: "Can you charge my tablet?",
        icon_uri: "assets/default-icons/battery.svg",
        alt_text: "Battery",
    },
];

/// Whether `index` is one of the fixed built-in slots.
pub fn is_fixed_slot(index: usize) -> bool {
    index < FIXED_SLOT_COUNT
}

/// The built-in phrase assigned to `index`, if any.
pub fn default_phrase(index: usize) -> Option<&'static DefaultPhrase> {
    DEFAULT_PHRASES.iter().find(|p| p.slot == index)
}

/// Write the built-in phrases into a fresh slot array (bootstrap only).
pub(super) fn seed(slots: &mut [PhraseSlot]) {
    let len = slots.len();
    for phrase in DEFAULT_PHRASES.iter().filter(|p| p.slot < len) {
        slots[phrase.slot] = PhraseSlot {
            index: phrase.slot,
            value: text::normalize(phrase.text),
            image_uri: Some(phrase.icon_uri.to_string()),
            image_alt_text: Some(phrase.alt_text.to_string()),
        };
    }
}

/// Re-apply the built-in phrase set over whatever the fixed slots hold.
/// User-triggered; goes through `save_at` so the usual persistence and
/// publish path runs.
pub async fn restore_defaults(store: &PhraseStore) {
    for phrase in DEFAULT_PHRASES {
        let result = store
            .save_at(
                phrase.slot,
                phrase.text,
                SaveOptions {
                    overwrite: true,
                    image_uri: Some(phrase.icon_uri.to_string()),
                    image_alt_text: Some(phrase.alt_text.to_string()),
                },
            )
            .await;
        if !result.ok {
            tracing::warn!(
                "Failed to restore default phrase at slot {}: {:?}",
                phrase.slot,
                result.error
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KeyValueStore, MemoryBlobStore, MemoryKeyValueStore};
    use crate::store::STORAGE_KEY;
    use std::sync::Arc;

    #[test]
    fn test_fixed_slot_bounds() {
        assert!(is_fixed_slot(0));
        assert!(is_fixed_slot(5));
        assert!(!is_fixed_slot(6));
    }

    #[test]
    fn test_default_phrase_lookup() {
        assert_eq!(default_phrase(0).unwrap().text, "YES");
        assert!(default_phrase(6).is_none());
    }

    #[test]
    fn test_default_phrases_are_mutually_distinct() {
        // seeding must never trip the store's duplicate constraint
        for (i, a) in DEFAULT_PHRASES.iter().enumerate() {
            for b in &DEFAULT_PHRASES[i + 1..] {
                assert_ne!(
                    crate::text::normalized_key(a.text),
                    crate::text::normalized_key(b.text)
                );
            }
        }
    }

    #[tokio::test]
    async fn test_fresh_backend_gets_seeded_once() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let store = PhraseStore::new(kv.clone(), Arc::new(MemoryBlobStore::new()), 12);

        let slots = store.get_all().await;
        assert_eq!(slots[0].value, "YES");
        assert_eq!(slots[1].value, "NO");
        assert_eq!(
            slots[5].image_uri.as_deref(),
            Some("assets/default-icons/battery.svg")
        );
        assert!(slots[6..].iter().all(|s| s.is_unassigned()));

        // the seed was persisted, so a fresh store sees it as user data
        assert!(kv.get(STORAGE_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_seeding_never_overwrites_existing_data() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        {
            let store = PhraseStore::new(kv.clone(), Arc::new(MemoryBlobStore::new()), 12);
            store.get_all().await; // first run: seeds
            store
                .save_at(
                    0,
                    "my own phrase",
                    SaveOptions {
                        overwrite: true,
                        ..Default::default()
                    },
                )
                .await;
        }

        // second process lifetime over the same backend
        let store = PhraseStore::new(kv, Arc::new(MemoryBlobStore::new()), 12);
        assert_eq!(store.get_all().await[0].value, "my own phrase");
    }

    #[tokio::test]
    async fn test_restore_defaults_reapplies_fixed_slots() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let store = PhraseStore::new(kv, Arc::new(MemoryBlobStore::new()), 12);
        store.get_all().await;
        store
            .save_at(
                0,
                "changed",
                SaveOptions {
                    overwrite: true,
                    ..Default::default()
                },
            )
            .await;

        restore_defaults(&store).await;
        let slots = store.get_all().await;
        assert_eq!(slots[0].value, "YES");
        assert_eq!(slots[0].image_alt_text.as_deref(), Some("Yes"));
    }
}
