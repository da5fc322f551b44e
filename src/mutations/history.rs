use chrono::{DateTime, TimeZone, Utc};

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{History, HistoryEntry, new_id, require_id};

/// One playback progress report.
#[derive(Debug, Clone)]
pub struct Progress {
    pub audio_id: String,
    pub progress_seconds: f64,
    pub played_at: DateTime<Utc>,
}

/// What to drop from a history.
#[derive(Debug, Clone)]
pub enum HistoryRemoval {
    All,
    /// Every entry whose audio id is listed.
    Audios(Vec<String>),
}

/// Applies a progress report to the current history.
///
/// "Today" is the calendar day containing `now` in `tz`. A second report for
/// an audio already played today rewrites that entry in place and leaves
/// `last` alone; anything else is prepended and becomes `last`.
pub fn apply_progress<Tz: TimeZone>(
    current: Option<History>,
    owner_id: &str,
    progress: &Progress,
    now: DateTime<Utc>,
    tz: &Tz,
) -> History {
    let entry = HistoryEntry {
        id: new_id(),
        audio_id: progress.audio_id.clone(),
        progress_seconds: progress.progress_seconds,
        played_at: progress.played_at,
    };

    let Some(mut history) = current else {
        return History {
            id: new_id(),
            owner_id: owner_id.to_string(),
            last: entry.clone(),
            all: vec![entry],
            created_at: now,
            updated_at: now,
        };
    };

    let today = now.with_timezone(tz).date_naive();
    let played_today = history.all.iter_mut().find(|e| {
        e.audio_id == progress.audio_id && e.played_at.with_timezone(tz).date_naive() == today
    });

    match played_today {
        Some(existing) => {
            existing.progress_seconds = progress.progress_seconds;
            existing.played_at = progress.played_at;
        }
        None => {
            history.all.insert(0, entry.clone());
            history.last = entry;
        }
    }

    history.updated_at = now;
    history
}

/// Records playback progress as a single read-modify-write on the store.
pub fn record_progress<Tz: TimeZone>(
    store: &dyn Store,
    user_id: &str,
    progress: &Progress,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Result<()> {
    require_id(&progress.audio_id, "audio")?;
    if !progress.progress_seconds.is_finite() || progress.progress_seconds < 0.0 {
        return Err(Error::InvalidInput(
            "progress must be a non-negative number".to_string(),
        ));
    }
    if store.get_audio(&progress.audio_id)?.is_none() {
        return Err(Error::NotFound);
    }

    store.update_history(user_id, &mut |current| {
        Ok(Some(apply_progress(current, user_id, progress, now, tz)))
    })?;
    Ok(())
}

pub fn remove_history(store: &dyn Store, user_id: &str, removal: &HistoryRemoval) -> Result<()> {
    match removal {
        HistoryRemoval::All => {
            store.delete_history(user_id)?;
        }
        HistoryRemoval::Audios(audio_ids) => {
            store.update_history(user_id, &mut |current| {
                Ok(current.map(|mut history| {
                    history.all.retain(|e| !audio_ids.contains(&e.audio_id));
                    history.updated_at = Utc::now();
                    history
                }))
            })?;
        }
    }
    Ok(())
}
