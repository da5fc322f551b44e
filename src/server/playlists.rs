use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;

use crate::auth::{RequireUser, RequireVerified};
use crate::mutations;
use crate::server::AppState;
use crate::server::dto::{
    CreatePlaylistRequest, PageParams, PlaylistIdParams, PlaylistItemParams, PlaylistResponse,
    PlaylistsParams, RemovePlaylistParams, UpdatePlaylistRequest,
};
use crate::server::response::{ApiError, StoreOptionExt, StoreResultExt, message};
use crate::server::validation::validate_title;
use crate::store::{PlaylistEdit, Store};
use crate::types::{Playlist, Visibility, new_id, require_id};
use crate::views::{self, Page};

/// Users may only pick `public` or `private`.
fn parse_visibility(raw: Option<&str>) -> Result<Visibility, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(Visibility::Public),
        Some(v) => match Visibility::parse(v) {
            Some(vis @ (Visibility::Public | Visibility::Private)) => Ok(vis),
            _ => Err(ApiError::bad_request("Visibility must be public or private")),
        },
    }
}

fn require_audio(store: &dyn Store, audio_id: &str) -> Result<(), ApiError> {
    require_id(audio_id, "audio")?;
    store
        .get_audio(audio_id)
        .api_err("Failed to get audio")?
        .or_not_found("Audio not found !")?;
    Ok(())
}

fn title_filter(title: Option<&str>) -> Option<&str> {
    title.map(str::trim).filter(|t| !t.is_empty())
}

pub async fn create_playlist(
    auth: RequireVerified,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreatePlaylistRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let title = validate_title(&req.title)?;
    let visibility = parse_visibility(req.visibility.as_deref())?;

    let mut items = Vec::new();
    if let Some(audio_id) = req.audio_id {
        require_audio(store, &audio_id)?;
        items.push(audio_id);
    }

    let now = Utc::now();
    let playlist = Playlist {
        id: new_id(),
        title,
        owner_id: auth.user.id.clone(),
        visibility,
        items,
        created_at: now,
        updated_at: now,
    };
    store
        .create_playlist(&playlist)
        .api_err("Failed to create playlist")?;

    Ok::<_, ApiError>((
        StatusCode::CREATED,
        Json(json!({ "playlist": PlaylistResponse::from(playlist) })),
    ))
}

/// Renames, changes visibility and optionally adds one audio (set union).
pub async fn update_playlist(
    auth: RequireVerified,
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdatePlaylistRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    require_id(&req.id, "playlist")?;
    let edit = PlaylistEdit {
        title: validate_title(&req.title)?,
        visibility: parse_visibility(Some(&req.visibility))?,
        add_audio: req.audio_id.clone(),
    };

    if let Some(audio_id) = &edit.add_audio {
        require_audio(store, audio_id)?;
    }

    let playlist = mutations::update_playlist(store, &auth.user.id, &req.id, &edit)
        .api_err("Playlist not found !")?;

    Ok::<_, ApiError>(Json(json!({ "playlist": PlaylistResponse::from(playlist) })))
}

/// `?playlistId&all=yes` deletes the playlist, `?playlistId&audioId` pulls one audio.
pub async fn remove_playlist(
    auth: RequireVerified,
    State(state): State<Arc<AppState>>,
    Query(params): Query<RemovePlaylistParams>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    if params.all.as_deref() == Some("yes") {
        mutations::delete_playlist(store, &auth.user.id, &params.playlist_id)
            .api_err("Playlist not found !")?;
        return Ok(message("Playlist deleted successfully !"));
    }

    let audio_id = params
        .audio_id
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("Either all=yes or audioId is required"))?;
    mutations::remove_from_playlist(store, &auth.user.id, &params.playlist_id, audio_id)
        .api_err("Playlist not found !")?;

    Ok::<_, ApiError>(message("Audio successfully removed !"))
}

pub async fn is_in_playlist(
    _auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PlaylistItemParams>,
) -> impl IntoResponse {
    require_id(&params.playlist_id, "playlist")?;
    require_id(&params.audio_id, "audio")?;
    let present = views::is_in_playlist(state.store.as_ref(), &params.playlist_id, &params.audio_id)
        .api_err("Failed to check playlist")?;

    Ok::<_, ApiError>(Json(present))
}

pub async fn list_playlists(
    auth: RequireVerified,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PlaylistsParams>,
) -> impl IntoResponse {
    let page = Page::new(params.limit, params.page_number)?;
    let playlists = views::playlists_by_owner(
        state.store.as_ref(),
        &auth.user.id,
        title_filter(params.title.as_deref()),
        page,
    )
    .api_err("Failed to list playlists")?;

    Ok::<_, ApiError>(Json(json!({ "playlists": playlists })))
}

pub async fn count_playlists(
    auth: RequireVerified,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PlaylistsParams>,
) -> impl IntoResponse {
    let count = views::count_playlists_by_owner(
        state.store.as_ref(),
        &auth.user.id,
        title_filter(params.title.as_deref()),
    )
    .api_err("Failed to count playlists")?;

    Ok::<_, ApiError>(Json(count))
}

pub async fn audios_total_count(
    auth: RequireVerified,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PlaylistIdParams>,
) -> impl IntoResponse {
    require_id(&params.playlist_id, "playlist")?;
    let count = views::audios_total_count(state.store.as_ref(), &auth.user.id, &params.playlist_id)
        .api_err("Playlist not found !")?;

    Ok::<_, ApiError>(Json(count))
}

pub async fn audios_total_duration(
    auth: RequireVerified,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PlaylistIdParams>,
) -> impl IntoResponse {
    require_id(&params.playlist_id, "playlist")?;
    let duration = views::total_duration(
        state.store.as_ref(),
        &params.playlist_id,
        Some(&auth.user.id),
    )
    .api_err("Playlist not found !")?;

    Ok::<_, ApiError>(Json(duration))
}

pub async fn playlist_audios(
    auth: RequireVerified,
    State(state): State<Arc<AppState>>,
    Path(playlist_id): Path<String>,
    Query(params): Query<PageParams>,
) -> impl IntoResponse {
    require_id(&playlist_id, "playlist")?;
    let page = Page::new(params.limit, params.page_number)?;
    let listing = views::playlist_audios(
        state.store.as_ref(),
        &playlist_id,
        Some(&auth.user.id),
        page,
    )
    .api_err("Playlist not found !")?;

    Ok::<_, ApiError>(Json(listing))
}
