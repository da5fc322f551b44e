use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{AudioRow, Page, contains_ignore_case, join_owners, resolve_audios};
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Playlist, Visibility};

/// Playlist summary for the owner's own listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistRow {
    pub id: String,
    pub title: String,
    pub visibility: Visibility,
    pub item_count: usize,
    /// Poster of the first resolvable item, used as the cover.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaylistAudios {
    pub id: String,
    pub title: String,
    pub audios: Vec<AudioRow>,
}

/// The owner's user-facing playlists (system playlists excluded), filtered and sorted.
fn filtered(store: &dyn Store, owner_id: &str, title: Option<&str>) -> Result<Vec<Playlist>> {
    let mut playlists: Vec<Playlist> = store
        .list_playlists_by_owner(owner_id)?
        .into_iter()
        .filter(|p| p.visibility != Visibility::Auto)
        .filter(|p| title.is_none_or(|t| contains_ignore_case(&p.title, t)))
        .collect();

    if title.is_some() {
        playlists.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
    }
    Ok(playlists)
}

pub fn playlists_by_owner(
    store: &dyn Store,
    owner_id: &str,
    title: Option<&str>,
    page: Page,
) -> Result<Vec<PlaylistRow>> {
    page.window(filtered(store, owner_id, title)?)
        .into_iter()
        .map(|p| {
            let poster = resolve_audios(store, &p.items)?
                .into_iter()
                .next()
                .and_then(|a| a.poster)
                .map(|a| a.url);
            Ok(PlaylistRow {
                item_count: p.items.len(),
                poster,
                id: p.id,
                title: p.title,
                visibility: p.visibility,
                created_at: p.created_at,
                updated_at: p.updated_at,
            })
        })
        .collect()
}

pub fn count_playlists_by_owner(
    store: &dyn Store,
    owner_id: &str,
    title: Option<&str>,
) -> Result<usize> {
    Ok(filtered(store, owner_id, title)?.len())
}

/// Audio of a playlist, paginated over its items.
///
/// Owners read their own playlists at any visibility, everyone else only
/// public and auto ones. An id that matches no readable playlist is looked up
/// among the curated auto playlists before giving up.
pub fn playlist_audios(
    store: &dyn Store,
    playlist_id: &str,
    viewer: Option<&str>,
    page: Page,
) -> Result<PlaylistAudios> {
    let (id, title, items) = match store
        .get_playlist(playlist_id)?
        .filter(|p| p.readable_by(viewer))
    {
        Some(p) => (p.id, p.title, p.items),
        None => {
            let curated = store.get_auto_playlist(playlist_id)?.ok_or(Error::NotFound)?;
            (curated.id, curated.title, curated.items)
        }
    };

    let audios = resolve_audios(store, page.slice(&items))?;
    Ok(PlaylistAudios {
        id,
        title,
        audios: join_owners(store, audios)?,
    })
}

/// Item count of one of the owner's playlists.
pub fn audios_total_count(store: &dyn Store, owner_id: &str, playlist_id: &str) -> Result<usize> {
    let playlist = store
        .get_playlist(playlist_id)?
        .filter(|p| p.owner_id == owner_id)
        .ok_or(Error::NotFound)?;
    Ok(playlist.items.len())
}

/// Sum of the durations of every resolvable item. An empty playlist totals 0.
pub fn total_duration(store: &dyn Store, playlist_id: &str, viewer: Option<&str>) -> Result<f64> {
    let playlist = store
        .get_playlist(playlist_id)?
        .filter(|p| p.readable_by(viewer))
        .ok_or(Error::NotFound)?;

    Ok(store
        .get_audios(&playlist.items)?
        .iter()
        .map(|a| a.duration_seconds)
        .sum())
}

pub fn is_in_playlist(store: &dyn Store, playlist_id: &str, audio_id: &str) -> Result<bool> {
    Ok(store
        .get_playlist(playlist_id)?
        .is_some_and(|p| p.items.iter().any(|id| id == audio_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixtures;
    use crate::types::Category;

    #[test]
    fn test_total_duration_rollup() {
        let store = fixtures::store();
        let owner = fixtures::user(&store, "owner");
        let items: Vec<String> = [125.0, 95.0, 40.0]
            .into_iter()
            .map(|d| fixtures::audio(&store, &owner.id, "Clip", Category::Music, d).id)
            .collect();
        let playlist = fixtures::playlist(&store, &owner.id, "Set", Visibility::Public, &items);

        assert_eq!(total_duration(&store, &playlist.id, Some(&owner.id)).unwrap(), 260.0);
    }

    #[test]
    fn test_total_duration_of_empty_playlist_is_zero() {
        let store = fixtures::store();
        let owner = fixtures::user(&store, "owner");
        let playlist = fixtures::playlist(
            &store,
            &owner.id,
            "Empty",
            Visibility::Public,
            &["deleted-audio".to_string()],
        );

        assert_eq!(total_duration(&store, &playlist.id, Some(&owner.id)).unwrap(), 0.0);
    }

    #[test]
    fn test_private_playlist_hidden_from_other_users() {
        let store = fixtures::store();
        let owner = fixtures::user(&store, "owner");
        let stranger = fixtures::user(&store, "stranger");
        let audio = fixtures::audio(&store, &owner.id, "Secret song", Category::Music, 10.0);
        let playlist = fixtures::playlist(
            &store,
            &owner.id,
            "Mine",
            Visibility::Private,
            &[audio.id.clone()],
        );

        let own = playlist_audios(&store, &playlist.id, Some(&owner.id), Page::default()).unwrap();
        assert_eq!(own.audios.len(), 1);

        assert!(matches!(
            playlist_audios(&store, &playlist.id, Some(&stranger.id), Page::default()),
            Err(Error::NotFound)
        ));
        assert!(matches!(
            playlist_audios(&store, &playlist.id, None, Page::default()),
            Err(Error::NotFound)
        ));
        assert!(matches!(
            total_duration(&store, &playlist.id, Some(&stranger.id)),
            Err(Error::NotFound)
        ));
    }

    #[test]
    fn test_playlist_audios_fall_back_to_curated_playlists() {
        let store = fixtures::store();
        let owner = fixtures::user(&store, "owner");
        let audio = fixtures::audio(&store, &owner.id, "Song", Category::Music, 10.0);
        let curated = fixtures::auto_playlist(&store, "Music", &[audio.id.clone()]);

        let listing = playlist_audios(&store, &curated.id, None, Page::default()).unwrap();
        assert_eq!(listing.title, "Music");
        assert_eq!(listing.audios[0].id, audio.id);
    }

    #[test]
    fn test_playlist_audios_paginate_items_before_resolving() {
        let store = fixtures::store();
        let owner = fixtures::user(&store, "owner");
        let items: Vec<String> = (0..5)
            .map(|i| fixtures::audio(&store, &owner.id, &format!("T{i}"), Category::Music, 1.0).id)
            .collect();
        let playlist = fixtures::playlist(&store, &owner.id, "Five", Visibility::Public, &items);

        let page = Page { limit: 2, number: 2 };
        let listing = playlist_audios(&store, &playlist.id, None, page).unwrap();
        assert_eq!(listing.audios.len(), 1);
        assert_eq!(listing.audios[0].title, "T4");
    }

    #[test]
    fn test_owner_listing_excludes_system_playlists_and_counts_match() {
        let store = fixtures::store();
        let owner = fixtures::user(&store, "owner");
        fixtures::playlist(&store, &owner.id, "Road trip", Visibility::Public, &[]);
        fixtures::playlist(&store, &owner.id, "Gym", Visibility::Private, &[]);
        fixtures::playlist(&store, &owner.id, "Trip home", Visibility::Public, &[]);
        store.upsert_mixed_playlist(&owner.id, &[]).unwrap();

        let all = playlists_by_owner(&store, &owner.id, None, Page::default()).unwrap();
        let titles: Vec<_> = all.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Trip home", "Gym", "Road trip"]);
        assert_eq!(count_playlists_by_owner(&store, &owner.id, None).unwrap(), 3);

        let trips = playlists_by_owner(&store, &owner.id, Some("TRIP"), Page::default()).unwrap();
        let titles: Vec<_> = trips.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Road trip", "Trip home"]);
        assert_eq!(count_playlists_by_owner(&store, &owner.id, Some("TRIP")).unwrap(), 2);
    }

    #[test]
    fn test_audios_total_count_is_owner_only() {
        let store = fixtures::store();
        let owner = fixtures::user(&store, "owner");
        let stranger = fixtures::user(&store, "stranger");
        let playlist = fixtures::playlist(
            &store,
            &owner.id,
            "Two",
            Visibility::Public,
            &["a".to_string(), "b".to_string()],
        );

        assert_eq!(audios_total_count(&store, &owner.id, &playlist.id).unwrap(), 2);
        assert!(matches!(
            audios_total_count(&store, &stranger.id, &playlist.id),
            Err(Error::NotFound)
        ));
        assert!(is_in_playlist(&store, &playlist.id, "a").unwrap());
        assert!(!is_in_playlist(&store, &playlist.id, "c").unwrap());
    }
}
