use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::seq::SliceRandom;

use super::{AudioRow, PlaylistSummary, join_owners};
use crate::error::Result;
use crate::store::Store;
use crate::types::{Audio, AutoPlaylist, Category, new_id};

/// How far back listening history counts towards a user's taste.
pub const RECENT_WINDOW_DAYS: i64 = 30;

const MIXED_SAMPLE_SIZE: usize = 20;
const AUTO_SAMPLE_SIZE: usize = 4;

fn by_popularity(a: &Audio, b: &Audio) -> std::cmp::Ordering {
    b.likes
        .len()
        .cmp(&a.likes.len())
        .then_with(|| a.id.cmp(&b.id))
}

/// Distinct categories of audio the user played within the last 30 days.
pub fn recent_categories(
    store: &dyn Store,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<Vec<Category>> {
    let Some(history) = store.get_history(user_id)? else {
        return Ok(Vec::new());
    };

    let since = now - Duration::days(RECENT_WINDOW_DAYS);
    let mut ids: Vec<String> = history
        .all
        .iter()
        .filter(|entry| entry.played_at >= since)
        .map(|entry| entry.audio_id.clone())
        .collect();
    ids.sort();
    ids.dedup();

    let categories: BTreeSet<Category> = store
        .get_audios(&ids)?
        .into_iter()
        .map(|audio| audio.category)
        .collect();
    Ok(categories.into_iter().collect())
}

/// Most-liked audio, restricted to the viewer's recent categories when there are any.
pub fn recommended_audios(
    store: &dyn Store,
    viewer: Option<&str>,
    limit: usize,
    now: DateTime<Utc>,
) -> Result<Vec<AudioRow>> {
    let categories = match viewer {
        Some(user_id) => recent_categories(store, user_id, now)?,
        None => Vec::new(),
    };

    let mut candidates: Vec<Audio> = store
        .list_audios()?
        .into_iter()
        .filter(|audio| categories.is_empty() || categories.contains(&audio.category))
        .collect();
    candidates.sort_by(by_popularity);

    let mut rows = join_owners(store, candidates)?;
    rows.truncate(limit);
    Ok(rows)
}

/// Rebuilds the user's "Mixed 20" playlist from sampled history, then returns a
/// sample of curated playlists followed by the Mixed summary.
pub fn auto_generated_playlists<R: Rng + ?Sized>(
    store: &dyn Store,
    user_id: &str,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<Vec<PlaylistSummary>> {
    if let Some(history) = store.get_history(user_id)? {
        let mut played: Vec<String> = history.all.into_iter().map(|e| e.audio_id).collect();
        played.sort();
        played.dedup();

        let items: Vec<String> = played
            .choose_multiple(rng, MIXED_SAMPLE_SIZE)
            .cloned()
            .collect();
        if !items.is_empty() {
            store.upsert_mixed_playlist(user_id, &items)?;
        }
    }

    let categories = recent_categories(store, user_id, now)?;
    let curated = store.list_auto_playlists()?;
    let preferred: Vec<&AutoPlaylist> = curated
        .iter()
        .filter(|p| categories.iter().any(|c| c.as_str() == p.title))
        .collect();
    let pool: Vec<&AutoPlaylist> = if preferred.is_empty() {
        curated.iter().collect()
    } else {
        preferred
    };

    let mut summaries: Vec<PlaylistSummary> = pool
        .choose_multiple(rng, AUTO_SAMPLE_SIZE)
        .map(|p| PlaylistSummary {
            id: p.id.clone(),
            title: p.title.clone(),
            item_count: p.items.len(),
        })
        .collect();

    if let Some(mixed) = store.get_mixed_playlist(user_id)? {
        summaries.push(PlaylistSummary {
            id: mixed.id,
            title: mixed.title,
            item_count: mixed.items.len(),
        });
    }

    Ok(summaries)
}

/// Regenerates the curated playlists: one per category holding its most-liked audio.
/// Playlists keep their id across refreshes; categories without audio get none.
pub fn refresh_auto_playlists(store: &dyn Store, per_playlist: usize) -> Result<Vec<AutoPlaylist>> {
    let existing: HashMap<String, AutoPlaylist> = store
        .list_auto_playlists()?
        .into_iter()
        .map(|p| (p.title.clone(), p))
        .collect();
    let audios = store.list_audios()?;
    let now = Utc::now();

    let mut playlists = Vec::new();
    for category in Category::ALL {
        let mut matching: Vec<&Audio> = audios.iter().filter(|a| a.category == category).collect();
        if matching.is_empty() {
            continue;
        }
        matching.sort_by(|a, b| by_popularity(a, b));

        let items = matching
            .into_iter()
            .take(per_playlist)
            .map(|a| a.id.clone())
            .collect();
        let (id, created_at) = existing
            .get(category.as_str())
            .map(|p| (p.id.clone(), p.created_at))
            .unwrap_or_else(|| (new_id(), now));

        playlists.push(AutoPlaylist {
            id,
            title: category.as_str().to_string(),
            items,
            created_at,
            updated_at: now,
        });
    }

    store.replace_auto_playlists(&playlists)?;
    tracing::info!("Refreshed {} auto playlists", playlists.len());

    Ok(playlists)
}
