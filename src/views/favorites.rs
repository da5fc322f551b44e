use std::cmp::Ordering;

use super::{AudioRow, Page, contains_ignore_case, join_owners, resolve_audios};
use crate::error::Result;
use crate::store::Store;
use crate::types::Category;

/// Optional filters shared by the favorites page and its count.
#[derive(Debug, Clone, Default)]
pub struct FavoriteFilter {
    /// Case-insensitive substring of the audio title.
    pub title: Option<String>,
    pub categories: Option<Vec<Category>>,
}

impl FavoriteFilter {
    fn matches(&self, row: &AudioRow) -> bool {
        if let Some(categories) = &self.categories {
            if !categories.contains(&row.category) {
                return false;
            }
        }
        match &self.title {
            Some(title) => contains_ignore_case(&row.title, title),
            None => true,
        }
    }

    fn order(&self, a: &AudioRow, b: &AudioRow) -> Ordering {
        if self.title.is_some() {
            a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id))
        } else {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        }
    }
}

/// Full filtered and sorted favorites list, before pagination.
fn filtered(store: &dyn Store, user_id: &str, filter: &FavoriteFilter) -> Result<Vec<AudioRow>> {
    let Some(favorite) = store.get_favorite(user_id)? else {
        return Ok(Vec::new());
    };

    let audios = resolve_audios(store, &favorite.items)?;
    let mut rows: Vec<AudioRow> = join_owners(store, audios)?
        .into_iter()
        .filter(|row| filter.matches(row))
        .collect();
    rows.sort_by(|a, b| filter.order(a, b));
    Ok(rows)
}

pub fn favorites(
    store: &dyn Store,
    user_id: &str,
    filter: &FavoriteFilter,
    page: Page,
) -> Result<Vec<AudioRow>> {
    Ok(page.window(filtered(store, user_id, filter)?))
}

pub fn count_favorites(store: &dyn Store, user_id: &str, filter: &FavoriteFilter) -> Result<usize> {
    Ok(filtered(store, user_id, filter)?.len())
}

pub fn is_favorite(store: &dyn Store, user_id: &str, audio_id: &str) -> Result<bool> {
    Ok(store
        .get_favorite(user_id)?
        .is_some_and(|f| f.items.iter().any(|id| id == audio_id)))
}
