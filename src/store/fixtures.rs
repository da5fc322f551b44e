//! Seed helpers shared by unit tests across the crate.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, Utc};

use super::{SqliteStore, Store};
use crate::types::*;

static CLOCK: AtomicI64 = AtomicI64::new(0);

/// Strictly increasing timestamps so that creation order is deterministic.
pub fn tick() -> DateTime<Utc> {
    Utc::now() + Duration::milliseconds(CLOCK.fetch_add(1, Ordering::SeqCst))
}

pub fn store() -> SqliteStore {
    let store = SqliteStore::in_memory().unwrap();
    store.initialize().unwrap();
    store
}

pub fn user(store: &SqliteStore, name: &str) -> User {
    let now = tick();
    let user = User {
        id: new_id(),
        name: name.to_string(),
        email: format!("{name}@example.com"),
        password_hash: "not-a-hash".to_string(),
        verified: true,
        avatar: None,
        created_at: now,
        updated_at: now,
    };
    store.create_user(&user).unwrap();
    user
}

pub fn audio(
    store: &SqliteStore,
    owner_id: &str,
    title: &str,
    category: Category,
    duration_seconds: f64,
) -> Audio {
    let now = tick();
    let id = new_id();
    let audio = Audio {
        file: Asset {
            url: format!("https://cdn.example.com/{id}.mp3"),
            public_id: id.clone(),
        },
        id,
        title: title.to_string(),
        about: format!("About {title}"),
        owner_id: owner_id.to_string(),
        category,
        poster: None,
        likes: Vec::new(),
        duration_seconds,
        created_at: now,
        updated_at: now,
    };
    store.create_audio(&audio).unwrap();
    audio
}

pub fn playlist(
    store: &SqliteStore,
    owner_id: &str,
    title: &str,
    visibility: Visibility,
    items: &[String],
) -> Playlist {
    let now = tick();
    let playlist = Playlist {
        id: new_id(),
        title: title.to_string(),
        owner_id: owner_id.to_string(),
        visibility,
        items: items.to_vec(),
        created_at: now,
        updated_at: now,
    };
    store.create_playlist(&playlist).unwrap();
    playlist
}

pub fn auto_playlist(store: &SqliteStore, title: &str, items: &[String]) -> AutoPlaylist {
    let now = tick();
    let playlist = AutoPlaylist {
        id: new_id(),
        title: title.to_string(),
        items: items.to_vec(),
        created_at: now,
        updated_at: now,
    };
    store.create_auto_playlist(&playlist).unwrap();
    playlist
}

/// Stores a history whose `all` is exactly `plays`, in the given order.
pub fn history(store: &SqliteStore, owner_id: &str, plays: &[(&str, DateTime<Utc>)]) -> History {
    let all: Vec<HistoryEntry> = plays
        .iter()
        .map(|(audio_id, played_at)| HistoryEntry {
            id: new_id(),
            audio_id: (*audio_id).to_string(),
            progress_seconds: 0.0,
            played_at: *played_at,
        })
        .collect();
    let now = tick();
    let history = History {
        id: new_id(),
        owner_id: owner_id.to_string(),
        last: all[0].clone(),
        all,
        created_at: now,
        updated_at: now,
    };

    let stored = history.clone();
    store
        .update_history(owner_id, &mut |_| Ok(Some(stored.clone())))
        .unwrap();
    history
}
