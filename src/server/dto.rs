use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::User;

// Accounts

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyEmailRequest {
    pub token: String,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResendVerificationRequest {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetTokenRequest {
    pub token: String,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub token: String,
    pub user_id: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogOutParams {
    #[serde(default)]
    pub from_all: Option<String>,
}

/// The signed-in user's own profile.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub followers: usize,
    pub followings: usize,
}

impl UserResponse {
    #[must_use]
    pub fn new(user: &User, followers: usize, followings: usize) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            verified: user.verified,
            avatar: user.avatar.as_ref().map(|a| a.url.clone()),
            followers,
            followings,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub user: UserResponse,
    pub token: String,
}

// Listing parameters

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub page_number: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitParams {
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoritesParams {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub page_number: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    /// Comma-separated category names.
    #[serde(default)]
    pub categories: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistsParams {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub page_number: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioIdParams {
    pub audio_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistIdParams {
    pub playlist_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemParams {
    pub playlist_id: String,
    pub audio_id: String,
}

// Playlists

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlaylistRequest {
    pub title: String,
    #[serde(default)]
    pub audio_id: Option<String>,
    #[serde(default)]
    pub visibility: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlaylistRequest {
    pub id: String,
    pub title: String,
    pub visibility: String,
    #[serde(default)]
    pub audio_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovePlaylistParams {
    pub playlist_id: String,
    #[serde(default)]
    pub audio_id: Option<String>,
    #[serde(default)]
    pub all: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistResponse {
    pub id: String,
    pub title: String,
    pub visibility: crate::types::Visibility,
    pub items: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<crate::types::Playlist> for PlaylistResponse {
    fn from(p: crate::types::Playlist) -> Self {
        Self {
            id: p.id,
            title: p.title,
            visibility: p.visibility,
            items: p.items,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

// History

#[derive(Debug, Deserialize)]
pub struct HistoryRequest {
    /// Audio id.
    pub audio: String,
    pub progress: f64,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RemoveHistoryParams {
    #[serde(default)]
    pub all: Option<String>,
    /// JSON array of audio ids.
    #[serde(default)]
    pub histories: Option<String>,
}

// Audio

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioResponse {
    pub id: String,
    pub title: String,
    pub about: String,
    pub category: crate::types::Category,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    pub duration: f64,
    pub created_at: DateTime<Utc>,
}

impl From<crate::types::Audio> for AudioResponse {
    fn from(a: crate::types::Audio) -> Self {
        Self {
            id: a.id,
            title: a.title,
            about: a.about,
            category: a.category,
            file: a.file.url,
            poster: a.poster.map(|p| p.url),
            duration: a.duration_seconds,
            created_at: a.created_at,
        }
    }
}
