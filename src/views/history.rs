use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use super::{OwnerSummary, join_owners, resolve_audios};
use crate::error::Result;
use crate::store::Store;
use crate::types::Audio;

const RECENTLY_PLAYED_LIMIT: usize = 10;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryDayItem {
    /// History entry id.
    pub id: String,
    pub audio_id: String,
    pub title: String,
    pub date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryDay {
    /// `YYYY-MM-DD`
    pub date: String,
    pub audios: Vec<HistoryDayItem>,
}

/// Groups the user's plays by calendar day in `tz`, newest day first.
/// Within a day, items keep storage order.
pub fn histories_by_day<Tz: TimeZone>(
    store: &dyn Store,
    user_id: &str,
    tz: &Tz,
) -> Result<Vec<HistoryDay>>
where
    Tz::Offset: std::fmt::Display,
{
    let Some(history) = store.get_history(user_id)? else {
        return Ok(Vec::new());
    };

    let mut ids: Vec<String> = history.all.iter().map(|e| e.audio_id.clone()).collect();
    ids.sort();
    ids.dedup();
    let audios: HashMap<String, Audio> = store
        .get_audios(&ids)?
        .into_iter()
        .map(|a| (a.id.clone(), a))
        .collect();

    let mut days: BTreeMap<String, Vec<HistoryDayItem>> = BTreeMap::new();
    for entry in history.all {
        let Some(audio) = audios.get(&entry.audio_id) else {
            continue;
        };
        let day = entry
            .played_at
            .with_timezone(tz)
            .format("%Y-%m-%d")
            .to_string();
        days.entry(day).or_default().push(HistoryDayItem {
            id: entry.id,
            audio_id: audio.id.clone(),
            title: audio.title.clone(),
            date: entry.played_at,
            poster: audio.poster.as_ref().map(|p| p.url.clone()),
        });
    }

    Ok(days
        .into_iter()
        .rev()
        .map(|(date, audios)| HistoryDay { date, audios })
        .collect())
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentlyPlayed {
    /// Position within the sorted slice, before unresolvable entries are dropped.
    pub index: usize,
    pub id: String,
    pub title: String,
    pub about: String,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    pub owner: OwnerSummary,
    pub date: DateTime<Utc>,
    pub progress: f64,
}

/// The first ten stored entries, newest first.
///
/// The slice is taken from storage order before sorting, so an out-of-order
/// `all` yields the first ten recorded rather than the ten most recent.
pub fn recently_played(store: &dyn Store, user_id: &str) -> Result<Vec<RecentlyPlayed>> {
    let Some(history) = store.get_history(user_id)? else {
        return Ok(Vec::new());
    };

    let mut recent: Vec<_> = history
        .all
        .into_iter()
        .take(RECENTLY_PLAYED_LIMIT)
        .collect();
    recent.sort_by(|a, b| b.played_at.cmp(&a.played_at));

    let ids: Vec<String> = recent.iter().map(|e| e.audio_id.clone()).collect();
    let rows: HashMap<String, _> = join_owners(store, resolve_audios(store, &ids)?)?
        .into_iter()
        .map(|row| (row.id.clone(), row))
        .collect();

    Ok(recent
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let row = rows.get(&entry.audio_id)?;
            Some(RecentlyPlayed {
                index,
                id: row.id.clone(),
                title: row.title.clone(),
                about: row.about.clone(),
                file: row.file.clone(),
                poster: row.poster.clone(),
                owner: row.owner.clone(),
                date: entry.played_at,
                progress: entry.progress_seconds,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::store::fixtures;
    use crate::types::Category;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_histories_grouped_by_day_newest_first() {
        let store = fixtures::store();
        let owner = fixtures::user(&store, "owner");
        let a = fixtures::audio(&store, &owner.id, "A", Category::Music, 10.0);
        let b = fixtures::audio(&store, &owner.id, "B", Category::Music, 10.0);
        fixtures::history(
            &store,
            &owner.id,
            &[
                (a.id.as_str(), at("2024-03-02T18:00:00Z")),
                (b.id.as_str(), at("2024-03-02T09:00:00Z")),
                (a.id.as_str(), at("2024-03-01T23:59:59Z")),
                ("gone", at("2024-02-28T10:00:00Z")),
            ],
        );

        let days = histories_by_day(&store, &owner.id, &Utc).unwrap();
        let dates: Vec<_> = days.iter().map(|d| d.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-03-02", "2024-03-01"]);

        let titles: Vec<_> = days[0].audios.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);
        assert_eq!(days[1].audios[0].audio_id, a.id);
    }

    #[test]
    fn test_histories_empty_without_history() {
        let store = fixtures::store();
        let owner = fixtures::user(&store, "owner");
        assert!(histories_by_day(&store, &owner.id, &Utc).unwrap().is_empty());
        assert!(recently_played(&store, &owner.id).unwrap().is_empty());
    }

    #[test]
    fn test_recently_played_slices_before_sorting() {
        let store = fixtures::store();
        let owner = fixtures::user(&store, "owner");
        let base = at("2024-05-01T12:00:00Z");

        let audios: Vec<_> = (0..12)
            .map(|i| fixtures::audio(&store, &owner.id, &format!("T{i}"), Category::Tech, 10.0))
            .collect();
        // Stored oldest-first, so the eleventh and twelfth entries (the newest)
        // fall outside the slice.
        let plays: Vec<(&str, DateTime<Utc>)> = audios
            .iter()
            .enumerate()
            .map(|(i, a)| (a.id.as_str(), base + Duration::minutes(i as i64)))
            .collect();
        fixtures::history(&store, &owner.id, &plays);

        let recent = recently_played(&store, &owner.id).unwrap();
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].title, "T9");
        assert_eq!(recent[0].index, 0);
        assert_eq!(recent[9].title, "T0");
        assert_eq!(recent[0].owner.name, "owner");
    }
}
