use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde_json::json;

use crate::auth::{RequireUser, RequireVerified};
use crate::mutations;
use crate::server::AppState;
use crate::server::dto::{AudioIdParams, FavoritesParams};
use crate::server::response::{ApiError, StoreResultExt};
use crate::types::{Category, require_id};
use crate::views::{self, FavoriteFilter, Page};

impl FavoritesParams {
    fn filter(&self) -> FavoriteFilter {
        FavoriteFilter {
            title: self
                .title
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            categories: self.categories.as_deref().and_then(Category::parse_list),
        }
    }
}

pub async fn toggle_favorite(
    auth: RequireVerified,
    State(state): State<Arc<AppState>>,
    Query(params): Query<AudioIdParams>,
) -> impl IntoResponse {
    let outcome = mutations::toggle_favorite(state.store.as_ref(), &auth.user.id, &params.audio_id)
        .api_err("Audio does not exist !")?;

    Ok::<_, ApiError>(Json(json!({ "message": outcome.message() })))
}

pub async fn list_favorites(
    auth: RequireVerified,
    State(state): State<Arc<AppState>>,
    Query(params): Query<FavoritesParams>,
) -> impl IntoResponse {
    let page = Page::new(params.limit, params.page_number)?;
    let favorites = views::favorites(state.store.as_ref(), &auth.user.id, &params.filter(), page)
        .api_err("Failed to list favorites")?;

    Ok::<_, ApiError>(Json(json!({ "favorites": favorites })))
}

pub async fn count_favorites(
    auth: RequireVerified,
    State(state): State<Arc<AppState>>,
    Query(params): Query<FavoritesParams>,
) -> impl IntoResponse {
    let count = views::count_favorites(state.store.as_ref(), &auth.user.id, &params.filter())
        .api_err("Failed to count favorites")?;

    Ok::<_, ApiError>(Json(count))
}

pub async fn is_favorite(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<AudioIdParams>,
) -> impl IntoResponse {
    require_id(&params.audio_id, "audio")?;
    let favorite = views::is_favorite(state.store.as_ref(), &auth.user.id, &params.audio_id)
        .api_err("Failed to check favorite")?;

    Ok::<_, ApiError>(Json(favorite))
}
