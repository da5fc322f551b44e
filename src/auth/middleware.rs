use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::helpers::{Principal, TokenValidationError, extract_token_from_header, validate_token};
use crate::server::AppState;
use crate::types::{Session, User};

/// Extractor that requires a signed-in user
pub struct RequireUser {
    pub session: Session,
    pub user: User,
}

/// Extractor that requires a signed-in user with a verified email
pub struct RequireVerified {
    pub session: Session,
    pub user: User,
}

/// Extractor for routes that also serve anonymous callers.
/// A malformed or unknown token is still rejected.
pub struct OptionalUser(pub Option<User>);

#[derive(Debug)]
pub enum AuthError {
    MissingAuth,
    InvalidScheme,
    InvalidToken,
    NotVerified,
    InternalError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingAuth => (StatusCode::FORBIDDEN, "Unauthorized request !"),
            AuthError::InvalidScheme => (StatusCode::FORBIDDEN, "Invalid authorization scheme"),
            AuthError::InvalidToken => (StatusCode::FORBIDDEN, "Invalid token"),
            AuthError::NotVerified => (StatusCode::FORBIDDEN, "Please verify your email"),
            AuthError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<TokenValidationError> for AuthError {
    fn from(e: TokenValidationError) -> Self {
        match e {
            TokenValidationError::InvalidScheme => AuthError::InvalidScheme,
            TokenValidationError::InvalidToken => AuthError::InvalidToken,
            TokenValidationError::InternalError => AuthError::InternalError,
        }
    }
}

impl FromRequestParts<Arc<AppState>> for RequireUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let principal = extract_principal(parts, state)?.ok_or(AuthError::MissingAuth)?;
        Ok(RequireUser {
            session: principal.session,
            user: principal.user,
        })
    }
}

impl FromRequestParts<Arc<AppState>> for RequireVerified {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let principal = extract_principal(parts, state)?.ok_or(AuthError::MissingAuth)?;

        if !principal.user.verified {
            return Err(AuthError::NotVerified);
        }

        Ok(RequireVerified {
            session: principal.session,
            user: principal.user,
        })
    }
}

impl FromRequestParts<Arc<AppState>> for OptionalUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let principal = extract_principal(parts, state)?;
        Ok(OptionalUser(principal.map(|p| p.user)))
    }
}

fn extract_principal(
    parts: &Parts,
    state: &Arc<AppState>,
) -> Result<Option<Principal>, AuthError> {
    let auth_header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let Some(raw_token) = extract_token_from_header(auth_header)? else {
        return Ok(None);
    };

    Ok(Some(validate_token(state, &raw_token)?))
}
