//! Cookie-based session authentication.
//!
//! A signed token issued at login travels in the `token` cookie. The
//! middleware resolves it to a user on every request; handlers that need a
//! login take the [`RequireUser`] extractor.

mod jwt;
mod password;

pub use jwt::*;
pub use password::*;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};

use crate::errors::AppError;
use crate::models::User;
use crate::AppState;

/// Name of the session cookie.
pub const TOKEN_COOKIE: &str = "token";

/// The user authenticated by the session cookie, stored in request extensions.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Extractor for routes that require a login. Rejects with 403.
#[derive(Debug, Clone)]
pub struct RequireUser(pub User);

impl<S: Send + Sync> FromRequestParts<S> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .map(|current| RequireUser(current.0.clone()))
            .ok_or_else(|| AppError::Forbidden("Login required".to_string()))
    }
}

/// Resolve the session cookie, if any, to a user.
///
/// Requests without a cookie pass through anonymously. An invalid or revoked
/// token is rejected with 401, except on logout, which must always succeed.
pub async fn cookie_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let Some(token) = token_from_headers(request.headers()) else {
        return next.run(request).await;
    };

    match authenticate(&state, &token).await {
        Ok(user) => {
            request.extensions_mut().insert(CurrentUser(user));
        }
        Err(e) if request.uri().path().contains("logout") => {
            tracing::debug!("Ignoring invalid token on logout: {}", e);
        }
        Err(e) => return e.into_response(),
    }

    next.run(request).await
}

async fn authenticate(state: &AppState, token: &str) -> Result<User, AppError> {
    let expired = || AppError::Unauthorized("Token expired.".to_string());

    let stored = state.repo.find_token(token).await?.ok_or_else(expired)?;
    let user_id = verify_token(token, &state.config.jwt_secret)?;

    let expires_at = DateTime::parse_from_rfc3339(&stored.expires_at)
        .map_err(|_| expired())?
        .with_timezone(&Utc);
    if stored.force_expiration || stored.user_id != user_id || expires_at <= Utc::now() {
        return Err(expired());
    }

    state
        .repo
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User does not exist.".to_string()))
}

/// Value of the session cookie in a `Cookie` header.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == TOKEN_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value carrying a session token.
pub fn session_cookie(token: &str, max_age_secs: u64) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(&format!(
        "{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
        TOKEN_COOKIE, token, max_age_secs
    ))
    .map_err(|e| AppError::Internal(format!("Invalid cookie value: {}", e)))
}

/// `Set-Cookie` value removing the session cookie.
pub fn cleared_cookie() -> HeaderValue {
    HeaderValue::from_static("token=; Max-Age=0; Path=/; HttpOnly; SameSite=Lax")
}
