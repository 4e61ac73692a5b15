//! Authentication API endpoints.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;

use super::{success, ApiResponse, ApiResult};
use crate::auth::{
    check_password_policy, cleared_cookie, hash_password, issue_token, session_cookie,
    token_from_headers, verify_password, CurrentUser,
};
use crate::errors::AppError;
use crate::models::{LoginRequest, RegisterRequest, SessionUser, User};
use crate::AppState;

/// Login result: the authenticated user, or a message when nothing was
/// supplied.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum LoginOutcome {
    User(SessionUser),
    Anonymous { message: String },
}

/// GET /api/v1/auth/users - List all users.
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Vec<User>> {
    success(state.repo.list_users().await?)
}

/// POST /api/v1/auth/login - Log in with credentials, or confirm the
/// session cookie.
pub async fn login(
    State(state): State<AppState>,
    current: Option<Extension<CurrentUser>>,
    body: Bytes,
) -> Result<Response, AppError> {
    if let Some(Extension(CurrentUser(user))) = current {
        return Ok(ApiResponse::new(LoginOutcome::User(user.into())).into_response());
    }

    let request: LoginRequest = if body.is_empty() {
        LoginRequest::default()
    } else {
        serde_json::from_slice(&body)?
    };
    let (Some(username), Some(password)) = (request.username, request.password) else {
        return Ok(ApiResponse::new(LoginOutcome::Anonymous {
            message: "Not Authenticated".to_string(),
        })
        .into_response());
    };

    let credentials = state
        .repo
        .find_credentials(&username)
        .await?
        .ok_or_else(|| {
            AppError::Unauthorized(format!("User with username '{}' does not exist.", username))
        })?;
    if !verify_password(&password, &credentials.password_hash) {
        return Err(AppError::Unauthorized(
            "Incorrect username or password.".to_string(),
        ));
    }

    let user: User = credentials.into();
    start_session(&state, user).await
}

/// POST /api/v1/auth/logout - Revoke the session token and clear the cookie.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    if let Some(token) = token_from_headers(&headers) {
        state.repo.expire_token(&token).await?;
    }

    Ok((
        [(header::SET_COOKIE, cleared_cookie())],
        ApiResponse::new(serde_json::json!({})),
    )
        .into_response())
}

/// POST /api/v1/auth/register - Create a user and log them in.
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Response, AppError> {
    super::require_text(&request.username, "Username")?;

    if state.repo.find_credentials(&request.username).await?.is_some() {
        return Err(AppError::Conflict(
            "Username or Email already registered.".to_string(),
        ));
    }
    check_password_policy(&request.password)?;

    let user = state
        .repo
        .create_user(&request.username, &hash_password(&request.password))
        .await?;
    tracing::info!("Registered user {} ({})", user.username, user.id);

    start_session(&state, user).await
}

async fn start_session(state: &AppState, user: User) -> Result<Response, AppError> {
    let ttl = state.config.token_ttl;
    let (token, expires_at) = issue_token(user.id, &state.config.jwt_secret, ttl)?;
    state
        .repo
        .store_token(&token, user.id, &expires_at.to_rfc3339())
        .await?;

    let cookie = session_cookie(&token, ttl.as_secs())?;
    Ok((
        [(header::SET_COOKIE, cookie)],
        ApiResponse::new(LoginOutcome::User(SessionUser::from(user))),
    )
        .into_response())
}
