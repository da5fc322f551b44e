use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;

use crate::auth::RequireVerified;
use crate::media::{self, AssetKind};
use crate::server::AppState;
use crate::server::dto::{AudioResponse, LimitParams};
use crate::server::response::{ApiError, StoreOptionExt, StoreResultExt};
use crate::server::upload::UploadForm;
use crate::server::validation::validate_title;
use crate::types::{Audio, Category, new_id, require_id};
use crate::views::{self, Page};

fn parse_category(form: &UploadForm) -> Result<Option<Category>, ApiError> {
    form.text("category")
        .map(|c| Category::parse(c).ok_or_else(|| ApiError::bad_request("Invalid category")))
        .transpose()
}

fn parse_duration(form: &UploadForm) -> Result<Option<f64>, ApiError> {
    let Some(raw) = form.text("duration") else {
        return Ok(None);
    };
    match raw.trim().parse::<f64>() {
        Ok(d) if d.is_finite() && d >= 0.0 => Ok(Some(d)),
        _ => Err(ApiError::bad_request("Invalid duration")),
    }
}

/// Multipart: `title`, `about`, `category`, `audio` file, optional `poster`
/// image and `duration` in seconds.
///
/// Media is relayed before anything is stored. If a later step fails, the
/// assets uploaded so far are removed again.
pub async fn create_audio(
    auth: RequireVerified,
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let mut form = UploadForm::read(&mut multipart).await?;

    let title = validate_title(form.text("title").unwrap_or_default())?;
    let about = form
        .text("about")
        .map(|a| a.trim().to_string())
        .ok_or_else(|| ApiError::bad_request("About is required"))?;
    let category = parse_category(&form)?.unwrap_or_default();
    let declared_duration = parse_duration(&form)?;
    let audio_blob = form
        .take_file("audio")
        .ok_or_else(|| ApiError::bad_request("Audio file is missing !"))?;
    let poster_blob = form.take_file("poster");

    let relay = state.media.as_ref();
    let file = relay.upload(audio_blob, AssetKind::Audio).await?;

    let poster = match poster_blob {
        Some(blob) => match relay.upload(blob, AssetKind::Image).await {
            Ok(poster) => Some(poster),
            Err(e) => {
                media::discard(relay, &file.public_id, AssetKind::Audio).await;
                return Err(ApiError::from(e));
            }
        },
        None => None,
    };

    let now = Utc::now();
    let audio = Audio {
        id: new_id(),
        title,
        about,
        owner_id: auth.user.id.clone(),
        category,
        file: file.asset(),
        poster: poster.as_ref().map(|p| p.asset()),
        likes: Vec::new(),
        duration_seconds: file
            .duration_seconds
            .or(declared_duration)
            .unwrap_or_default(),
        created_at: now,
        updated_at: now,
    };

    if let Err(e) = state.store.create_audio(&audio) {
        media::discard(relay, &file.public_id, AssetKind::Audio).await;
        if let Some(poster) = &poster {
            media::discard(relay, &poster.public_id, AssetKind::Image).await;
        }
        return Err(e).api_err("Failed to create audio");
    }
    tracing::info!("Audio {} uploaded by {}", audio.id, auth.user.id);

    Ok::<_, ApiError>((
        StatusCode::CREATED,
        Json(json!({ "audio": AudioResponse::from(audio) })),
    ))
}

/// Multipart: any of `title`, `about`, `category` and a replacement `poster`.
pub async fn update_audio(
    auth: RequireVerified,
    State(state): State<Arc<AppState>>,
    Path(audio_id): Path<String>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    require_id(&audio_id, "audio")?;
    let mut form = UploadForm::read(&mut multipart).await?;

    let mut audio = state
        .store
        .get_audio(&audio_id)
        .api_err("Failed to get audio")?
        .filter(|a| a.owner_id == auth.user.id)
        .or_not_found("Audio file not found !")?;

    if let Some(title) = form.text("title") {
        audio.title = validate_title(title)?;
    }
    if let Some(about) = form.text("about") {
        audio.about = about.trim().to_string();
    }
    if let Some(category) = parse_category(&form)? {
        audio.category = category;
    }

    let relay = state.media.as_ref();
    let mut uploaded_id = None;
    let mut replaced = None;
    if let Some(blob) = form.take_file("poster") {
        let poster = relay.upload(blob, AssetKind::Image).await?;
        uploaded_id = Some(poster.public_id.clone());
        replaced = audio.poster.replace(poster.asset());
    }

    audio.updated_at = Utc::now();
    if let Err(e) = state.store.update_audio(&audio) {
        if let Some(public_id) = uploaded_id {
            media::discard(relay, &public_id, AssetKind::Image).await;
        }
        return Err(e).api_err("Failed to update audio");
    }

    if let Some(old) = replaced {
        media::discard(relay, &old.public_id, AssetKind::Image).await;
    }

    Ok::<_, ApiError>(Json(json!({ "audio": AudioResponse::from(audio) })))
}

pub async fn latest_uploads(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitParams>,
) -> impl IntoResponse {
    let page = Page::new(params.limit, None)?;
    let uploads = views::latest_uploads(state.store.as_ref(), page.limit)
        .api_err("Failed to list uploads")?;

    Ok::<_, ApiError>(Json(json!({ "uploads": uploads })))
}
