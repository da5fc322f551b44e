use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use chrono::{Local, Utc};
use serde_json::json;

use crate::auth::RequireVerified;
use crate::mutations::{self, HistoryRemoval, Progress};
use crate::server::AppState;
use crate::server::dto::{HistoryRequest, RemoveHistoryParams};
use crate::server::response::{ApiError, StoreResultExt, message};
use crate::views;

impl RemoveHistoryParams {
    fn removal(&self) -> Result<HistoryRemoval, ApiError> {
        if self.all.as_deref() == Some("yes") {
            return Ok(HistoryRemoval::All);
        }
        let raw = self
            .histories
            .as_deref()
            .ok_or_else(|| ApiError::bad_request("Either all=yes or histories is required"))?;
        let audio_ids: Vec<String> = serde_json::from_str(raw)
            .map_err(|_| ApiError::bad_request("histories must be a JSON array of audio ids"))?;
        Ok(HistoryRemoval::Audios(audio_ids))
    }
}

/// Records playback progress. "Today" is the server's local calendar day.
pub async fn record_progress(
    auth: RequireVerified,
    State(state): State<Arc<AppState>>,
    Json(req): Json<HistoryRequest>,
) -> impl IntoResponse {
    let progress = Progress {
        audio_id: req.audio,
        progress_seconds: req.progress,
        played_at: req.date,
    };
    mutations::record_progress(
        state.store.as_ref(),
        &auth.user.id,
        &progress,
        Utc::now(),
        &Local,
    )
    .api_err("Audio not found !")?;

    Ok::<_, ApiError>(Json(json!({ "success": true })))
}

pub async fn remove_history(
    auth: RequireVerified,
    State(state): State<Arc<AppState>>,
    Query(params): Query<RemoveHistoryParams>,
) -> impl IntoResponse {
    let removal = params.removal()?;
    mutations::remove_history(state.store.as_ref(), &auth.user.id, &removal)
        .api_err("Failed to remove history")?;

    let reply = match removal {
        HistoryRemoval::All => "History deleted entirely !",
        HistoryRemoval::Audios(_) => "Record(s) from history deleted !",
    };
    Ok::<_, ApiError>(message(reply))
}

pub async fn histories_by_day(
    auth: RequireVerified,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let days = views::histories_by_day(state.store.as_ref(), &auth.user.id, &Local)
        .api_err("Failed to list history")?;

    Ok::<_, ApiError>(Json(days))
}

pub async fn recently_played(
    auth: RequireVerified,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let audios = views::recently_played(state.store.as_ref(), &auth.user.id)
        .api_err("Failed to list recently played")?;

    Ok::<_, ApiError>(Json(json!({ "audios": audios })))
}
