//! Read-only derived views over the store.
//!
//! Every view is a plain function over `&dyn Store` that expands references,
//! joins the referenced documents (dropping misses), filters, sorts, and
//! finally paginates. None of them write, except `auto_generated_playlists`
//! which refreshes the caller's "Mixed 20" playlist as a side effect.

mod favorites;
mod history;
mod playlists;
mod profile;
mod recommend;

pub use favorites::{FavoriteFilter, count_favorites, favorites, is_favorite};
pub use history::{HistoryDay, HistoryDayItem, RecentlyPlayed, histories_by_day, recently_played};
pub use playlists::{
    PlaylistAudios, PlaylistRow, audios_total_count, count_playlists_by_owner, is_in_playlist,
    playlist_audios, playlists_by_owner, total_duration,
};
pub use profile::{
    PublicProfile, followers, followings, is_following, latest_uploads, owner_audios,
    public_playlists, public_profile,
};
pub use recommend::{
    auto_generated_playlists, recent_categories, recommended_audios, refresh_auto_playlists,
};

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Audio, Category, User};

/// Page window for list views; `number` is 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: usize,
    pub number: usize,
}

impl Page {
    pub const DEFAULT_LIMIT: usize = 20;
    pub const MAX_LIMIT: usize = 100;

    /// Validates raw query values. Missing values take the defaults.
    pub fn new(limit: Option<i64>, number: Option<i64>) -> Result<Self> {
        let limit = limit.unwrap_or(Self::DEFAULT_LIMIT as i64);
        if !(1..=Self::MAX_LIMIT as i64).contains(&limit) {
            return Err(Error::InvalidInput(format!(
                "limit must be between 1 and {}",
                Self::MAX_LIMIT
            )));
        }

        let number = number.unwrap_or(0);
        if number < 0 {
            return Err(Error::InvalidInput(
                "pageNumber must not be negative".to_string(),
            ));
        }

        Ok(Self {
            limit: limit as usize,
            number: number as usize,
        })
    }

    #[must_use]
    pub fn skip(&self) -> usize {
        self.limit.saturating_mul(self.number)
    }

    /// Applies `skip = limit * number, take = limit`.
    #[must_use]
    pub fn window<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.skip())
            .take(self.limit)
            .collect()
    }

    /// Same window over a borrowed sequence, used to slice id lists before resolving them.
    #[must_use]
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = self.skip().min(items.len());
        let end = start.saturating_add(self.limit).min(items.len());
        &items[start..end]
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: Self::DEFAULT_LIMIT,
            number: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OwnerSummary {
    pub id: String,
    pub name: String,
}

/// Audio joined with its owner, the row shape shared by most listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioRow {
    pub id: String,
    pub title: String,
    pub about: String,
    pub category: Category,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    pub duration: f64,
    pub owner: OwnerSummary,
    pub created_at: DateTime<Utc>,
}

impl AudioRow {
    fn new(audio: Audio, owner: &User) -> Self {
        Self {
            id: audio.id,
            title: audio.title,
            about: audio.about,
            category: audio.category,
            file: audio.file.url,
            poster: audio.poster.map(|p| p.url),
            duration: audio.duration_seconds,
            owner: OwnerSummary {
                id: owner.id.clone(),
                name: owner.name.clone(),
            },
            created_at: audio.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSummary {
    pub id: String,
    pub title: String,
    pub item_count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            avatar: user.avatar.map(|a| a.url),
        }
    }
}

/// Resolves ids in order, dropping ids that no longer resolve.
fn resolve_audios(store: &dyn Store, ids: &[String]) -> Result<Vec<Audio>> {
    let mut found: HashMap<String, Audio> = store
        .get_audios(ids)?
        .into_iter()
        .map(|a| (a.id.clone(), a))
        .collect();
    Ok(ids.iter().filter_map(|id| found.remove(id)).collect())
}

fn resolve_users(store: &dyn Store, ids: &[String]) -> Result<Vec<User>> {
    let mut found: HashMap<String, User> = store
        .get_users(ids)?
        .into_iter()
        .map(|u| (u.id.clone(), u))
        .collect();
    Ok(ids.iter().filter_map(|id| found.remove(id)).collect())
}

/// Joins each audio with its owner, keeping input order. Audio whose owner is gone is dropped.
fn join_owners(store: &dyn Store, audios: Vec<Audio>) -> Result<Vec<AudioRow>> {
    let mut owner_ids: Vec<String> = audios.iter().map(|a| a.owner_id.clone()).collect();
    owner_ids.sort();
    owner_ids.dedup();

    let owners: HashMap<String, User> = store
        .get_users(&owner_ids)?
        .into_iter()
        .map(|u| (u.id.clone(), u))
        .collect();

    Ok(audios
        .into_iter()
        .filter_map(|audio| {
            let owner = owners.get(&audio.owner_id)?;
            Some(AudioRow::new(audio, owner))
        })
        .collect())
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults_and_bounds() {
        assert_eq!(Page::new(None, None).unwrap(), Page::default());
        assert!(matches!(Page::new(Some(0), None), Err(Error::InvalidInput(_))));
        assert!(matches!(Page::new(Some(101), None), Err(Error::InvalidInput(_))));
        assert!(matches!(Page::new(Some(10), Some(-1)), Err(Error::InvalidInput(_))));
        assert_eq!(Page::new(Some(5), Some(3)).unwrap().skip(), 15);
    }

    #[test]
    fn test_page_slice_clamps_to_bounds() {
        let items = [1, 2, 3, 4, 5];
        let page = Page { limit: 2, number: 2 };
        assert_eq!(page.slice(&items), &[5]);

        let past_end = Page { limit: 2, number: 9 };
        assert!(past_end.slice(&items).is_empty());
        assert!(past_end.window(items.to_vec()).is_empty());
    }
}
