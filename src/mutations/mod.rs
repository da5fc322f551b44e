//! State-changing operations on the catalogue.
//!
//! Each function validates its ids and delegates multi-document writes to a
//! single store method, which applies them in one transaction.

mod history;

pub use history::{HistoryRemoval, Progress, apply_progress, record_progress, remove_history};

use crate::error::{Error, Result};
use crate::store::{PlaylistEdit, Store};
use crate::types::{FavoriteToggle, Playlist, Visibility, require_id};

/// Flips the user's favorite on `audio_id`, keeping `Audio.likes` in lockstep.
pub fn toggle_favorite(store: &dyn Store, user_id: &str, audio_id: &str) -> Result<FavoriteToggle> {
    require_id(audio_id, "audio")?;
    let outcome = store.toggle_favorite(user_id, audio_id)?;
    tracing::debug!("Favorite {} for {} on {}", outcome.message(), user_id, audio_id);
    Ok(outcome)
}

pub fn follow(store: &dyn Store, user_id: &str, profile_id: &str) -> Result<()> {
    require_id(profile_id, "profile")?;
    if user_id == profile_id {
        return Err(Error::InvalidInput("cannot follow yourself".to_string()));
    }
    store.follow(user_id, profile_id)
}

pub fn unfollow(store: &dyn Store, user_id: &str, profile_id: &str) -> Result<()> {
    require_id(profile_id, "profile")?;
    store.unfollow(user_id, profile_id)
}

/// Set-union add of an audio to one of the owner's playlists.
pub fn add_to_playlist(
    store: &dyn Store,
    owner_id: &str,
    playlist_id: &str,
    audio_id: &str,
) -> Result<bool> {
    require_id(playlist_id, "playlist")?;
    require_id(audio_id, "audio")?;
    owned_playlist(store, owner_id, playlist_id)?;
    if store.get_audio(audio_id)?.is_none() {
        return Err(Error::NotFound);
    }
    store.add_playlist_item(playlist_id, audio_id)
}

/// Renames and re-scopes one of the owner's playlists, set-adding
/// `edit.add_audio` in the same write.
pub fn update_playlist(
    store: &dyn Store,
    owner_id: &str,
    playlist_id: &str,
    edit: &PlaylistEdit,
) -> Result<Playlist> {
    require_id(playlist_id, "playlist")?;
    if edit.visibility == Visibility::Auto {
        return Err(Error::InvalidInput(
            "visibility must be public or private".to_string(),
        ));
    }
    if let Some(audio_id) = &edit.add_audio {
        require_id(audio_id, "audio")?;
        if store.get_audio(audio_id)?.is_none() {
            return Err(Error::NotFound);
        }
    }
    store.edit_playlist(playlist_id, owner_id, edit)
}

pub fn remove_from_playlist(
    store: &dyn Store,
    owner_id: &str,
    playlist_id: &str,
    audio_id: &str,
) -> Result<bool> {
    require_id(playlist_id, "playlist")?;
    require_id(audio_id, "audio")?;
    owned_playlist(store, owner_id, playlist_id)?;
    store.remove_playlist_item(playlist_id, audio_id)
}

pub fn delete_playlist(store: &dyn Store, owner_id: &str, playlist_id: &str) -> Result<()> {
    require_id(playlist_id, "playlist")?;
    owned_playlist(store, owner_id, playlist_id)?;
    store.delete_playlist(playlist_id)?;
    Ok(())
}

/// Other users' playlists and system playlists read as absent.
fn owned_playlist(store: &dyn Store, owner_id: &str, playlist_id: &str) -> Result<()> {
    match store.get_playlist(playlist_id)? {
        Some(p) if p.owner_id == owner_id && p.visibility != Visibility::Auto => Ok(()),
        _ => Err(Error::NotFound),
    }
}
