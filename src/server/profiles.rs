use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;

use crate::auth::{OptionalUser, RequireUser, RequireVerified};
use crate::mutations;
use crate::server::AppState;
use crate::server::dto::{LimitParams, PageParams};
use crate::server::response::{ApiError, StoreResultExt, message};
use crate::types::require_id;
use crate::views::{self, Page};

pub async fn follow(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(profile_id): Path<String>,
) -> impl IntoResponse {
    mutations::follow(state.store.as_ref(), &auth.user.id, &profile_id)
        .api_err("Profile not found !")?;

    Ok::<_, ApiError>(message("Profile added to follow !"))
}

pub async fn unfollow(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(profile_id): Path<String>,
) -> impl IntoResponse {
    mutations::unfollow(state.store.as_ref(), &auth.user.id, &profile_id)
        .api_err("Profile not found !")?;

    Ok::<_, ApiError>(message("Profile removed from follow !"))
}

pub async fn is_following(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(profile_id): Path<String>,
) -> impl IntoResponse {
    require_id(&profile_id, "profile")?;
    let status = views::is_following(state.store.as_ref(), &auth.user.id, &profile_id)
        .api_err("Failed to check follow")?;

    Ok::<_, ApiError>(Json(json!({ "status": status })))
}

pub async fn my_followers(
    auth: RequireVerified,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> impl IntoResponse {
    let page = Page::new(params.limit, params.page_number)?;
    let followers = views::followers(state.store.as_ref(), &auth.user.id, page)
        .api_err("Failed to list followers")?;

    Ok::<_, ApiError>(Json(json!({ "followers": followers })))
}

pub async fn profile_followers(
    _auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(profile_id): Path<String>,
    Query(params): Query<PageParams>,
) -> impl IntoResponse {
    require_id(&profile_id, "profile")?;
    let page = Page::new(params.limit, params.page_number)?;
    let followers = views::followers(state.store.as_ref(), &profile_id, page)
        .api_err("Failed to list followers")?;

    Ok::<_, ApiError>(Json(json!({ "followers": followers })))
}

pub async fn my_followings(
    auth: RequireVerified,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> impl IntoResponse {
    let page = Page::new(params.limit, params.page_number)?;
    let followings = views::followings(state.store.as_ref(), &auth.user.id, page)
        .api_err("Failed to list followings")?;

    Ok::<_, ApiError>(Json(json!({ "followings": followings })))
}

pub async fn my_audios_count(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let count = state
        .store
        .count_audios_by_owner(&auth.user.id)
        .api_err("Failed to count audios")?;

    Ok::<_, ApiError>(Json(count))
}

pub async fn profile_audios(
    State(state): State<Arc<AppState>>,
    Path(profile_id): Path<String>,
    Query(params): Query<PageParams>,
) -> impl IntoResponse {
    require_id(&profile_id, "profile")?;
    let page = Page::new(params.limit, params.page_number)?;
    let audios = views::owner_audios(state.store.as_ref(), &profile_id, page)
        .api_err("Failed to list audios")?;

    Ok::<_, ApiError>(Json(json!({ "audios": audios })))
}

pub async fn public_profile(
    State(state): State<Arc<AppState>>,
    Path(profile_id): Path<String>,
) -> impl IntoResponse {
    require_id(&profile_id, "profile")?;
    let profile = views::public_profile(state.store.as_ref(), &profile_id)
        .api_err("Profile not found !")?;

    Ok::<_, ApiError>(Json(json!({ "profile": profile })))
}

pub async fn public_playlists(
    State(state): State<Arc<AppState>>,
    Path(profile_id): Path<String>,
    Query(params): Query<PageParams>,
) -> impl IntoResponse {
    require_id(&profile_id, "profile")?;
    let page = Page::new(params.limit, params.page_number)?;
    let playlists = views::public_playlists(state.store.as_ref(), &profile_id, page)
        .api_err("Failed to list playlists")?;

    Ok::<_, ApiError>(Json(json!({ "playlists": playlists })))
}

/// Audio of any playlist the caller may read; anonymous callers see public ones.
pub async fn playlist_audios(
    OptionalUser(viewer): OptionalUser,
    State(state): State<Arc<AppState>>,
    Path(playlist_id): Path<String>,
    Query(params): Query<PageParams>,
) -> impl IntoResponse {
    require_id(&playlist_id, "playlist")?;
    let page = Page::new(params.limit, params.page_number)?;
    let listing = views::playlist_audios(
        state.store.as_ref(),
        &playlist_id,
        viewer.as_ref().map(|u| u.id.as_str()),
        page,
    )
    .api_err("Playlist not found !")?;

    Ok::<_, ApiError>(Json(listing))
}

pub async fn recommended(
    OptionalUser(viewer): OptionalUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitParams>,
) -> impl IntoResponse {
    let page = Page::new(params.limit, None)?;
    let audios = views::recommended_audios(
        state.store.as_ref(),
        viewer.as_ref().map(|u| u.id.as_str()),
        page.limit,
        Utc::now(),
    )
    .api_err("Failed to list recommendations")?;

    Ok::<_, ApiError>(Json(json!({ "audios": audios })))
}

pub async fn auto_generated_playlists(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let playlists = {
        let mut rng = rand::thread_rng();
        views::auto_generated_playlists(state.store.as_ref(), &auth.user.id, &mut rng, Utc::now())
            .api_err("Failed to build playlists")?
    };

    Ok::<_, ApiError>(Json(json!({ "playlists": playlists })))
}
