use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{Category, Visibility};

/// A blob held by the media relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub url: String,
    pub public_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<Asset>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An active sign-in. The raw token is only ever shown once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    #[serde(skip)]
    pub token_hash: String,
    #[serde(skip)]
    pub token_lookup: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Audio {
    pub id: String,
    pub title: String,
    pub about: String,
    pub owner_id: String,
    pub category: Category,
    pub file: Asset,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<Asset>,
    pub likes: Vec<String>,
    pub duration_seconds: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    pub title: String,
    pub owner_id: String,
    pub visibility: Visibility,
    pub items: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Playlist {
    /// Title of the per-user system playlist rebuilt from listening history.
    pub const MIXED_TITLE: &'static str = "Mixed 20";

    /// Readable by `viewer`: owners see everything, others never see private lists.
    #[must_use]
    pub fn readable_by(&self, viewer: Option<&str>) -> bool {
        viewer == Some(self.owner_id.as_str()) || self.visibility != Visibility::Private
    }
}

/// System-curated playlist; `title` doubles as a category tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoPlaylist {
    pub id: String,
    pub title: String,
    pub items: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub id: String,
    pub owner_id: String,
    pub items: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of a favorite toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteToggle {
    Removed,
    Added,
    /// Added into a favorites list created by this call.
    Created,
}

impl FavoriteToggle {
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            FavoriteToggle::Removed => "removed",
            FavoriteToggle::Added => "added",
            FavoriteToggle::Created => "Added & Created",
        }
    }

    #[must_use]
    pub const fn is_favorite(self) -> bool {
        !matches!(self, FavoriteToggle::Removed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub audio_id: String,
    pub progress_seconds: f64,
    pub played_at: DateTime<Utc>,
}

/// Listening history; `all` is kept most-recent-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct History {
    pub id: String,
    pub owner_id: String,
    pub last: HistoryEntry,
    pub all: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OneTimeTokenKind {
    EmailVerification,
    PasswordReset,
}

impl OneTimeTokenKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            OneTimeTokenKind::EmailVerification => "email_verification",
            OneTimeTokenKind::PasswordReset => "password_reset",
        }
    }
}

/// Email verification or password reset token, hashed at rest.
#[derive(Debug, Clone)]
pub struct OneTimeToken {
    pub owner_id: String,
    pub kind: OneTimeTokenKind,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
}

impl OneTimeToken {
    #[must_use]
    pub fn ttl() -> Duration {
        Duration::hours(1)
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.created_at + Self::ttl()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playlist(visibility: Visibility) -> Playlist {
        Playlist {
            id: "p".to_string(),
            title: "Road trip".to_string(),
            owner_id: "owner".to_string(),
            visibility,
            items: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_private_playlist_only_readable_by_owner() {
        let p = playlist(Visibility::Private);
        assert!(p.readable_by(Some("owner")));
        assert!(!p.readable_by(Some("stranger")));
        assert!(!p.readable_by(None));
    }

    #[test]
    fn test_public_and_auto_playlists_readable_by_anyone() {
        assert!(playlist(Visibility::Public).readable_by(None));
        assert!(playlist(Visibility::Auto).readable_by(Some("stranger")));
    }

    #[test]
    fn test_one_time_token_expires_after_an_hour() {
        let created = Utc::now() - Duration::minutes(59);
        let token = OneTimeToken {
            owner_id: "u".to_string(),
            kind: OneTimeTokenKind::PasswordReset,
            token_hash: String::new(),
            created_at: created,
        };
        assert!(!token.is_expired(Utc::now()));
        assert!(token.is_expired(created + Duration::hours(1)));
    }
}
