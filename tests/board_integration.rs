//! End-to-end board flow over file-backed storage
//!
//! Exercises the real wiring a consuming UI uses: a press-hold
//! confirmation gating a store mutation, file-backed persistence across
//! store instances (simulated app restarts), and image blob lifecycle on
//! disk.

use phraseboard::config::{ButtonSize, PhraseButtonConfig, PhraseButtonConfigStore};
use phraseboard::press_hold::{PressHoldEngine, PressHoldEvent};
use phraseboard::storage::{FileBlobStore, FileKeyValueStore};
use phraseboard::store::{PhraseStore, SaveOptions};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Advance paused test time in sub-tick steps, letting tick tasks run.
async fn run_for(ms: u64) {
    let step = Duration::from_millis(10);
    for _ in 0..(ms / 10) {
        tokio::time::advance(step).await;
    }
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_press_hold_confirmation_gates_a_save() {
    let dir = tempfile::tempdir().unwrap();
    let kv = Arc::new(FileKeyValueStore::new(dir.path().join("kv")));
    let blobs = Arc::new(FileBlobStore::new(dir.path().join("images")));
    let store = PhraseStore::new(kv, blobs, 12);

    let engine = PressHoldEngine::new();
    let mut events = engine.subscribe();

    // the user holds the save control for slot 7
    engine.start_press_timer("save-slot-7", 500);
    run_for(550).await;

    let mut confirmed = None;
    while let Ok(event) = events.try_recv() {
        if let PressHoldEvent::Completed { button_id } = event {
            confirmed = Some(button_id);
        }
    }
    assert_eq!(confirmed.as_deref(), Some("save-slot-7"));

    // the UI dispatches the confirmed action to the store
    let result = store
        .save_at(7, "I would like some water", SaveOptions::default())
        .await;
    assert!(result.ok);
    assert_eq!(store.get_all().await[7].value, "I would like some water");
}

#[tokio::test]
async fn test_phrases_survive_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let kv = Arc::new(FileKeyValueStore::new(dir.path().join("kv")));
        let blobs = Arc::new(FileBlobStore::new(dir.path().join("images")));
        let store = PhraseStore::new(kv, blobs, 12);
        // fresh backend: defaults get seeded
        assert_eq!(store.get_all().await[0].value, "YES");

        let result = store
            .save_at(8, "turn on the radio", SaveOptions::default())
            .await;
        assert!(result.ok);
    }

    // second process lifetime over the same directory
    let kv = Arc::new(FileKeyValueStore::new(dir.path().join("kv")));
    let blobs = Arc::new(FileBlobStore::new(dir.path().join("images")));
    let store = PhraseStore::new(kv, blobs, 12);

    let slots = store.get_all().await;
    assert_eq!(slots[0].value, "YES");
    assert_eq!(slots[8].value, "turn on the radio");
    // seeding never re-applies over existing data
    assert_eq!(
        store.find_duplicate_index("TURN ON THE RADIO").await,
        Some(8)
    );
}

#[tokio::test]
async fn test_image_lifecycle_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let picked_a = dir.path().join("gallery_a.jpg");
    let picked_b = dir.path().join("gallery_b.jpg");
    std::fs::write(&picked_a, b"first image").unwrap();
    std::fs::write(&picked_b, b"second image").unwrap();

    let kv = Arc::new(FileKeyValueStore::new(dir.path().join("kv")));
    let blobs = Arc::new(FileBlobStore::new(dir.path().join("images")));
    let store = PhraseStore::new(kv, blobs, 12);

    store
        .set_image_at(9, picked_a.to_str().unwrap(), Some("water cup".to_string()))
        .await
        .unwrap();
    let first_uri = store.get_all().await[9].image_uri.clone().unwrap();
    assert!(Path::new(&first_uri).exists());

    // replacing the image deletes the previously owned blob
    store
        .set_image_at(9, picked_b.to_str().unwrap(), Some("water cup".to_string()))
        .await
        .unwrap();
    let second_uri = store.get_all().await[9].image_uri.clone().unwrap();
    assert!(!Path::new(&first_uri).exists());
    assert_eq!(std::fs::read(&second_uri).unwrap(), b"second image");

    store.remove_image_at(9).await;
    assert!(!Path::new(&second_uri).exists());
    assert_eq!(store.get_all().await[9].image_uri, None);
}

#[tokio::test]
async fn test_board_config_drives_capacity_migration() {
    let dir = tempfile::tempdir().unwrap();
    let kv = Arc::new(FileKeyValueStore::new(dir.path().join("kv")));
    let blobs = Arc::new(FileBlobStore::new(dir.path().join("images")));

    let config_store = PhraseButtonConfigStore::new(kv.clone());
    let store = PhraseStore::new(kv.clone(), blobs, config_store.config().await.count);
    assert_eq!(store.capacity(), 12);

    // the user picks a bigger board in settings
    let new_config = PhraseButtonConfig {
        count: 24,
        size: ButtonSize::Large,
    };
    config_store.set_config(new_config).await;
    store.update_capacity(new_config.count, false).await;

    assert_eq!(store.capacity(), 24);
    let slots = store.get_all().await;
    assert_eq!(slots.len(), 24);
    for (i, slot) in slots.iter().enumerate() {
        assert_eq!(slot.index, i);
    }

    // a fresh config store over the same backend sees the choice
    let fresh = PhraseButtonConfigStore::new(kv);
    assert_eq!(fresh.config().await.count, 24);
}
