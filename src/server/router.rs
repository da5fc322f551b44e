use std::sync::Arc;
use std::time::Instant;

use axum::error_handling::HandleErrorLayer;
use axum::extract::{DefaultBodyLimit, Request};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::{
    BoxError, Json, Router,
    routing::{delete, get, patch, post},
};
use serde_json::json;
use tower::ServiceBuilder;
use tower::timeout::TimeoutLayer;

use super::upload::MAX_UPLOAD_SIZE;
use super::{audios, favorites, history, media, playlists, profiles, users};
use crate::auth::TokenGenerator;
use crate::config::ServerConfig;
use crate::error::Result;
use crate::mail::{self, Mailer};
use crate::media::{self as relay, LocalMediaRelay, MediaRelay};
use crate::store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub media: Arc<dyn MediaRelay>,
    pub mailer: Arc<dyn Mailer>,
    /// Serves `/media/{file}` for whatever the local relay has written.
    pub local_media: LocalMediaRelay,
    pub tokens: TokenGenerator,
    pub config: ServerConfig,
}

impl AppState {
    /// Builds the media relay and mailer named by `config`.
    pub fn new(store: Arc<dyn Store>, config: ServerConfig) -> Result<Self> {
        let media = relay::from_config(&config);
        let mailer = mail::from_config(&config);
        Self::with_services(store, media, mailer, config)
    }

    pub fn with_services(
        store: Arc<dyn Store>,
        media: Arc<dyn MediaRelay>,
        mailer: Arc<dyn Mailer>,
        config: ServerConfig,
    ) -> Result<Self> {
        Ok(Self {
            store,
            media,
            mailer,
            local_media: LocalMediaRelay::new(&config.data_dir, config.base_url()),
            tokens: TokenGenerator::new()?,
            config,
        })
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

async fn handle_timeout(err: BoxError) -> impl IntoResponse {
    if err.is::<tower::timeout::error::Elapsed>() {
        (
            StatusCode::REQUEST_TIMEOUT,
            Json(json!({ "error": "Request timed out" })),
        )
    } else {
        tracing::error!("Unhandled middleware error: {err}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Internal server error" })),
        )
    }
}

fn users_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/add", post(users::register))
        .route("/verify-email", post(users::verify_email))
        .route("/re-verify-email", post(users::resend_verification))
        .route("/forgot-password", post(users::forgot_password))
        .route(
            "/verify-password-reset-token",
            post(users::verify_password_reset_token),
        )
        .route("/change-password", post(users::change_password))
        .route("/sign-in", post(users::sign_in))
        .route("/is-auth", get(users::is_auth))
        .route("/is-verified/{user_id}", get(users::is_verified))
        .route(
            "/update-profile",
            post(users::update_profile).layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE)),
        )
        .route("/log-out", post(users::log_out))
}

fn audio_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/add", post(audios::create_audio))
        .route("/update/{audio_id}", patch(audios::update_audio))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE))
        .route("/latest", get(audios::latest_uploads))
}

fn favorites_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(favorites::list_favorites))
        .route("/toggle", post(favorites::toggle_favorite))
        .route("/is-favorite", get(favorites::is_favorite))
        .route("/total-count", get(favorites::count_favorites))
}

fn playlist_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/add", post(playlists::create_playlist))
        .route("/update", patch(playlists::update_playlist))
        .route("/delete", delete(playlists::remove_playlist))
        .route("/is-in-playlist", get(playlists::is_in_playlist))
        .route("/by-profile", get(playlists::list_playlists))
        .route("/total-count", get(playlists::count_playlists))
        .route("/audios-total-count", get(playlists::audios_total_count))
        .route(
            "/audios-total-duration",
            get(playlists::audios_total_duration),
        )
        .route("/{playlist_id}", get(playlists::playlist_audios))
}

fn history_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/",
            post(history::record_progress)
                .delete(history::remove_history)
                .get(history::histories_by_day),
        )
        .route("/recently-played", get(history::recently_played))
}

fn profile_router() -> Router<Arc<AppState>> {
    Router::new()
        // Follow graph
        .route("/follow/{profile_id}", post(profiles::follow))
        .route("/unfollow/{profile_id}", post(profiles::unfollow))
        .route("/is-following/{profile_id}", get(profiles::is_following))
        .route("/followers", get(profiles::my_followers))
        .route("/followers/{profile_id}", get(profiles::profile_followers))
        .route("/followings", get(profiles::my_followings))
        // Uploads
        .route("/audios-total-count", get(profiles::my_audios_count))
        .route("/audios/{profile_id}", get(profiles::profile_audios))
        // Public views
        .route("/info/{profile_id}", get(profiles::public_profile))
        .route("/playlist/{profile_id}", get(profiles::public_playlists))
        .route(
            "/playlist-audios/{playlist_id}",
            get(profiles::playlist_audios),
        )
        // Recommendations
        .route("/recommended", get(profiles::recommended))
        .route(
            "/auto-generated-playlist",
            get(profiles::auto_generated_playlists),
        )
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let timeout = state.config.request_timeout();

    Router::new()
        .route("/health", get(health))
        .route("/media/{file}", get(media::serve_media))
        .nest("/api/v1/users", users_router())
        .nest("/api/v1/audio", audio_router())
        .nest("/api/v1/favorites", favorites_router())
        .nest("/api/v1/playlist", playlist_router())
        .nest("/api/v1/history", history_router())
        .nest("/api/v1/profile", profile_router())
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_timeout))
                .layer(TimeoutLayer::new(timeout)),
        )
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;
    use crate::mail::LogMailer;
    use crate::store::fixtures;

    fn router(temp: &TempDir) -> Router {
        let config = ServerConfig {
            data_dir: temp.path().to_path_buf(),
            ..ServerConfig::default()
        };
        let media = Arc::new(LocalMediaRelay::new(temp.path(), config.base_url()));
        let state =
            AppState::with_services(Arc::new(fixtures::store()), media, Arc::new(LogMailer), config)
                .unwrap();
        create_router(Arc::new(state))
    }

    async fn call(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_state_from_config_serves_local_media() {
        let temp = TempDir::new().unwrap();
        let config = ServerConfig {
            data_dir: temp.path().to_path_buf(),
            ..ServerConfig::default()
        };
        let state = AppState::new(Arc::new(fixtures::store()), config).unwrap();
        let uploaded = state
            .media
            .upload(
                relay::Blob {
                    bytes: bytes::Bytes::from_static(b"poster"),
                    file_name: Some("cover.png".to_string()),
                },
                relay::AssetKind::Image,
            )
            .await
            .unwrap();

        let (status, body) =
            call(create_router(Arc::new(state)), &format!("/media/{}", uploaded.public_id)).await;
        assert_eq!((status, body.as_str()), (StatusCode::OK, "poster"));
    }

    #[tokio::test]
    async fn test_health() {
        let temp = TempDir::new().unwrap();
        assert_eq!(call(router(&temp), "/health").await, (StatusCode::OK, "OK".to_string()));
    }

    #[tokio::test]
    async fn test_protected_routes_need_a_session() {
        let temp = TempDir::new().unwrap();
        let (status, body) = call(router(&temp), "/api/v1/favorites").await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["error"], "Unauthorized request !");
    }

    #[tokio::test]
    async fn test_anonymous_listing_and_missing_media() {
        let temp = TempDir::new().unwrap();

        let (status, body) = call(router(&temp), "/api/v1/audio/latest").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"uploads":[]}"#);

        let (status, _) = call(router(&temp), "/media/missing.mp3").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
