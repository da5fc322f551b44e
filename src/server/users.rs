use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;

use crate::auth::{RequireUser, generate_code, generate_reset_token};
use crate::error::Error;
use crate::mail::Email;
use crate::media::{self, AssetKind};
use crate::server::AppState;
use crate::server::dto::{
    ChangePasswordRequest, ForgotPasswordRequest, LogOutParams, RegisterRequest,
    ResendVerificationRequest, ResetTokenRequest, SignInRequest, SignInResponse, UserResponse,
    VerifyEmailRequest,
};
use crate::server::response::{ApiError, StoreOptionExt, StoreResultExt, message};
use crate::server::upload::UploadForm;
use crate::server::validation::{validate_email, validate_name, validate_password};
use crate::types::{OneTimeToken, OneTimeTokenKind, Session, User, new_id, require_id};

const MAX_SESSION_RETRIES: usize = 3;

fn user_response(state: &AppState, user: &User) -> Result<UserResponse, ApiError> {
    let followers = state
        .store
        .list_followers(&user.id)
        .api_err("Failed to count followers")?;
    let followings = state
        .store
        .list_followings(&user.id)
        .api_err("Failed to count followings")?;
    Ok(UserResponse::new(user, followers.len(), followings.len()))
}

/// Stores a hashed one-time secret for `user`, replacing any previous one.
fn issue_one_time_token(
    state: &AppState,
    user: &User,
    kind: OneTimeTokenKind,
    secret: &str,
) -> Result<(), ApiError> {
    let token = OneTimeToken {
        owner_id: user.id.clone(),
        kind,
        token_hash: state
            .tokens
            .hash(secret)
            .api_err("Failed to hash token")?,
        created_at: Utc::now(),
    };
    state
        .store
        .replace_one_time_token(&token)
        .api_err("Failed to store token")
}

fn send_verification_code(state: &AppState, user: &User) -> Result<(), ApiError> {
    let code = generate_code();
    issue_one_time_token(state, user, OneTimeTokenKind::EmailVerification, &code)?;
    state
        .mailer
        .deliver(Email::verification(&user.email, &user.name, &code));
    Ok(())
}

/// Checks `secret` against the user's live one-time token of `kind`.
fn check_one_time_token(
    state: &AppState,
    user_id: &str,
    kind: OneTimeTokenKind,
    secret: &str,
) -> Result<User, ApiError> {
    require_id(user_id, "user")?;
    let store = state.store.as_ref();

    let token = store
        .get_one_time_token(user_id, kind)
        .api_err("Failed to get token")?
        .ok_or_else(|| ApiError::forbidden("Invalid token !"))?;

    if !state
        .tokens
        .verify(secret, &token.token_hash)
        .api_err("Failed to verify token")?
    {
        return Err(ApiError::forbidden("Invalid token !"));
    }

    store
        .get_user(user_id)
        .api_err("Failed to get user")?
        .or_not_found("User not found !")
}

fn create_session(state: &AppState, user: &User) -> Result<String, ApiError> {
    for _ in 0..MAX_SESSION_RETRIES {
        let (raw_token, lookup, hash) = state
            .tokens
            .generate()
            .api_err("Failed to generate token")?;

        let session = Session {
            id: new_id(),
            token_hash: hash,
            token_lookup: lookup,
            user_id: user.id.clone(),
            created_at: Utc::now(),
            last_used_at: None,
        };

        match state.store.create_session(&session) {
            Ok(()) => return Ok(raw_token),
            Err(Error::TokenLookupCollision) => continue,
            Err(e) => return Err(e).api_err("Failed to create session"),
        }
    }

    Err(ApiError::internal("Failed to create session after retries"))
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    let name = validate_name(&req.name)?;
    let email = validate_email(&req.email)?;
    validate_password(&req.password)?;

    let store = state.store.as_ref();
    if store
        .get_user_by_email(&email)
        .api_err("Failed to check email")?
        .is_some()
    {
        return Err(ApiError::conflict("Email address already in use !"));
    }

    let now = Utc::now();
    let user = User {
        id: new_id(),
        name,
        email,
        password_hash: state
            .tokens
            .hash(&req.password)
            .api_err("Failed to hash password")?,
        verified: false,
        avatar: None,
        created_at: now,
        updated_at: now,
    };
    store.create_user(&user).api_err("Failed to create user")?;
    tracing::info!("Registered user {}", user.id);

    send_verification_code(&state, &user)?;

    Ok::<_, ApiError>((
        StatusCode::CREATED,
        Json(json!({ "user": UserResponse::new(&user, 0, 0) })),
    ))
}

pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyEmailRequest>,
) -> impl IntoResponse {
    let mut user = check_one_time_token(
        &state,
        &req.user_id,
        OneTimeTokenKind::EmailVerification,
        &req.token,
    )?;

    user.verified = true;
    user.updated_at = Utc::now();
    state.store.update_user(&user).api_err("Failed to update user")?;
    state
        .store
        .delete_one_time_token(&user.id, OneTimeTokenKind::EmailVerification)
        .api_err("Failed to delete token")?;

    Ok::<_, ApiError>(message("Your email has been verified !"))
}

pub async fn resend_verification(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResendVerificationRequest>,
) -> impl IntoResponse {
    require_id(&req.user_id, "user")?;

    let user = state
        .store
        .get_user(&req.user_id)
        .api_err("Failed to get user")?
        .or_not_found("This user does not exist !")?;

    if user.verified {
        return Ok(message("This user already has their email verified !"));
    }

    send_verification_code(&state, &user)?;

    Ok::<_, ApiError>(message(
        "Token verification re-sent. Please check your email !",
    ))
}

pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ForgotPasswordRequest>,
) -> impl IntoResponse {
    let email = validate_email(&req.email)?;
    let user = state
        .store
        .get_user_by_email(&email)
        .api_err("Failed to get user")?
        .or_not_found("User does not exist !")?;

    let token = generate_reset_token();
    issue_one_time_token(&state, &user, OneTimeTokenKind::PasswordReset, &token)?;

    let link = format!(
        "{}?token={}&userId={}",
        state.config.password_reset_link,
        urlencoding::encode(&token),
        urlencoding::encode(&user.id)
    );
    state
        .mailer
        .deliver(Email::password_reset(&user.email, &link));

    Ok::<_, ApiError>(message("Check your email for the password reset link !"))
}

pub async fn verify_password_reset_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetTokenRequest>,
) -> impl IntoResponse {
    check_one_time_token(
        &state,
        &req.user_id,
        OneTimeTokenKind::PasswordReset,
        &req.token,
    )?;

    Ok::<_, ApiError>(message("Your token is valid !"))
}

/// Sets a new password with a reset token and signs the user out everywhere.
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChangePasswordRequest>,
) -> impl IntoResponse {
    validate_password(&req.password)?;
    let mut user = check_one_time_token(
        &state,
        &req.user_id,
        OneTimeTokenKind::PasswordReset,
        &req.token,
    )?;

    if state
        .tokens
        .verify(&req.password, &user.password_hash)
        .api_err("Failed to verify password")?
    {
        return Err(ApiError::bad_request(
            "The new password cannot be the same as the old one !",
        ));
    }

    user.password_hash = state
        .tokens
        .hash(&req.password)
        .api_err("Failed to hash password")?;
    user.updated_at = Utc::now();

    let store = state.store.as_ref();
    store.update_user(&user).api_err("Failed to update user")?;
    store
        .delete_one_time_token(&user.id, OneTimeTokenKind::PasswordReset)
        .api_err("Failed to delete token")?;
    let revoked = store
        .delete_user_sessions(&user.id)
        .api_err("Failed to revoke sessions")?;
    tracing::info!("Password changed for {}, revoked {} sessions", user.id, revoked);

    state
        .mailer
        .deliver(Email::password_changed(&user.email, &user.name));

    Ok::<_, ApiError>(message("Password changed successfully !"))
}

pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignInRequest>,
) -> impl IntoResponse {
    const BAD_CREDENTIALS: &str = "The email or password are not correct !";

    let email = req.email.trim().to_lowercase();
    let user = state
        .store
        .get_user_by_email(&email)
        .api_err("Failed to get user")?
        .ok_or_else(|| ApiError::forbidden(BAD_CREDENTIALS))?;

    if !state
        .tokens
        .verify(&req.password, &user.password_hash)
        .api_err("Failed to verify password")?
    {
        return Err(ApiError::forbidden(BAD_CREDENTIALS));
    }

    let token = create_session(&state, &user)?;

    Ok::<_, ApiError>(Json(SignInResponse {
        user: user_response(&state, &user)?,
        token,
    }))
}

pub async fn is_auth(auth: RequireUser, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Ok::<_, ApiError>(Json(json!({ "user": user_response(&state, &auth.user)? })))
}

pub async fn is_verified(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    require_id(&user_id, "user")?;
    let user = state
        .store
        .get_user(&user_id)
        .api_err("Failed to get user")?
        .or_not_found("User not found !")?;

    Ok::<_, ApiError>(Json(user.verified))
}

/// Multipart: optional `name`, `email` and `avatar` image.
pub async fn update_profile(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let mut form = UploadForm::read(&mut multipart).await?;
    let mut user = auth.user;

    if let Some(name) = form.text("name") {
        user.name = validate_name(name)?;
    }
    if let Some(email) = form.text("email") {
        let email = validate_email(email)?;
        if email != user.email {
            if state
                .store
                .get_user_by_email(&email)
                .api_err("Failed to check email")?
                .is_some()
            {
                return Err(ApiError::conflict("Email address already in use !"));
            }
            user.email = email;
        }
    }

    let mut uploaded_id = None;
    let mut replaced = None;
    if let Some(blob) = form.take_file("avatar") {
        let uploaded = state.media.upload(blob, AssetKind::Image).await?;
        uploaded_id = Some(uploaded.public_id.clone());
        replaced = user.avatar.replace(uploaded.asset());
    }

    user.updated_at = Utc::now();
    if let Err(e) = state.store.update_user(&user) {
        if let Some(public_id) = uploaded_id {
            media::discard(state.media.as_ref(), &public_id, AssetKind::Image).await;
        }
        return Err(e).api_err("Failed to update profile");
    }

    if let Some(old) = replaced {
        media::discard(state.media.as_ref(), &old.public_id, AssetKind::Image).await;
    }

    Ok::<_, ApiError>(Json(json!({ "user": user_response(&state, &user)? })))
}

pub async fn log_out(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<LogOutParams>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    if params.from_all.as_deref() == Some("yes") {
        store
            .delete_user_sessions(&auth.user.id)
            .api_err("Failed to log out")?;
        return Ok(message("Successfully logged out from all devices !"));
    }

    store
        .delete_session(&auth.session.id)
        .api_err("Failed to log out")?;
    Ok::<_, ApiError>(message("Successfully logged out !"))
}
