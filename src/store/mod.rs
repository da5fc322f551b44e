mod schema;
mod sqlite;

#[cfg(test)]
pub(crate) mod fixtures;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Closure applied to a user's history inside a single store transaction.
/// Returning `None` deletes the history document.
/// New title and visibility for a playlist, plus an optional audio to add.
#[derive(Debug, Clone)]
pub struct PlaylistEdit {
    pub title: String,
    pub visibility: Visibility,
    pub add_audio: Option<String>,
}

pub type HistoryUpdate<'a> = dyn FnMut(Option<History>) -> Result<Option<History>> + 'a;

/// Store defines the database interface.
///
/// Multi-document writes (favorite toggles, follow edges, history updates)
/// are single methods so that implementations can apply them atomically.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    fn get_users(&self, ids: &[String]) -> Result<Vec<User>>;
    fn update_user(&self, user: &User) -> Result<()>;

    // Session operations
    fn create_session(&self, session: &Session) -> Result<()>;
    fn get_session_by_lookup(&self, lookup: &str) -> Result<Option<Session>>;
    fn delete_session(&self, id: &str) -> Result<bool>;
    fn delete_user_sessions(&self, user_id: &str) -> Result<usize>;
    fn update_session_last_used(&self, id: &str) -> Result<()>;

    // One-time token operations (expired tokens read as absent)
    fn replace_one_time_token(&self, token: &OneTimeToken) -> Result<()>;
    fn get_one_time_token(
        &self,
        owner_id: &str,
        kind: OneTimeTokenKind,
    ) -> Result<Option<OneTimeToken>>;
    fn delete_one_time_token(&self, owner_id: &str, kind: OneTimeTokenKind) -> Result<bool>;

    // Follow graph: both sides are written together
    fn follow(&self, user_id: &str, profile_id: &str) -> Result<()>;
    fn unfollow(&self, user_id: &str, profile_id: &str) -> Result<()>;
    fn list_followers(&self, user_id: &str) -> Result<Vec<String>>;
    fn list_followings(&self, user_id: &str) -> Result<Vec<String>>;

    // Audio operations
    fn create_audio(&self, audio: &Audio) -> Result<()>;
    fn get_audio(&self, id: &str) -> Result<Option<Audio>>;
    fn get_audios(&self, ids: &[String]) -> Result<Vec<Audio>>;
    fn list_audios(&self) -> Result<Vec<Audio>>;
    fn list_audios_by_owner(&self, owner_id: &str) -> Result<Vec<Audio>>;
    fn list_latest_audios(&self, limit: usize) -> Result<Vec<Audio>>;
    fn count_audios_by_owner(&self, owner_id: &str) -> Result<i64>;
    /// Updates descriptive fields and poster. Likes are owned by `toggle_favorite`.
    fn update_audio(&self, audio: &Audio) -> Result<()>;

    // Favorite operations
    fn get_favorite(&self, owner_id: &str) -> Result<Option<Favorite>>;
    fn toggle_favorite(&self, owner_id: &str, audio_id: &str) -> Result<FavoriteToggle>;

    // Playlist operations
    fn create_playlist(&self, playlist: &Playlist) -> Result<()>;
    fn get_playlist(&self, id: &str) -> Result<Option<Playlist>>;
    fn get_mixed_playlist(&self, owner_id: &str) -> Result<Option<Playlist>>;
    fn list_playlists_by_owner(&self, owner_id: &str) -> Result<Vec<Playlist>>;
    /// Applies `edit` to a user playlist of `owner_id` in one transaction.
    /// Items are only ever set-added; auto playlists read as absent.
    fn edit_playlist(&self, id: &str, owner_id: &str, edit: &PlaylistEdit) -> Result<Playlist>;
    fn delete_playlist(&self, id: &str) -> Result<bool>;
    /// Set-union add. Returns false when the audio was already present.
    fn add_playlist_item(&self, id: &str, audio_id: &str) -> Result<bool>;
    fn remove_playlist_item(&self, id: &str, audio_id: &str) -> Result<bool>;
    /// Creates or overwrites the owner's "Mixed 20" auto playlist.
    fn upsert_mixed_playlist(&self, owner_id: &str, items: &[String]) -> Result<Playlist>;

    // Auto playlist operations
    fn create_auto_playlist(&self, playlist: &AutoPlaylist) -> Result<()>;
    fn get_auto_playlist(&self, id: &str) -> Result<Option<AutoPlaylist>>;
    fn list_auto_playlists(&self) -> Result<Vec<AutoPlaylist>>;
    fn replace_auto_playlists(&self, playlists: &[AutoPlaylist]) -> Result<()>;

    // History operations
    fn get_history(&self, owner_id: &str) -> Result<Option<History>>;
    fn update_history(
        &self,
        owner_id: &str,
        apply: &mut HistoryUpdate<'_>,
    ) -> Result<Option<History>>;
    fn delete_history(&self, owner_id: &str) -> Result<bool>;

    fn close(&self) -> Result<()>;
}
