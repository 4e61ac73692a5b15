//! REST API module.
//!
//! Contains all API routes and handlers under `/api/v1`.

mod audit;
mod auth;
mod badges;
mod bugs;
mod discussion;
mod documents;
mod organisations;
mod projects;

pub use audit::*;
pub use auth::*;
pub use badges::*;
pub use bugs::*;
pub use discussion::*;
pub use documents::*;
pub use organisations::*;
pub use projects::*;

use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::AppError;

/// Success response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse::new(data))
}

/// Number of rows a bulk delete removed.
#[derive(Debug, Serialize)]
pub struct Deleted {
    pub deleted: u64,
}

/// Adds `X-Process-Time` (seconds) and `X-Route-Name` to every response.
pub async fn timing_layer(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "<unmatched>".to_string());

    let start = Instant::now();
    let mut response = next.run(request).await;
    let elapsed = start.elapsed().as_secs_f64();

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&format!("{:.6}", elapsed)) {
        headers.insert("x-process-time", value);
    }
    if let Ok(value) = HeaderValue::from_str(&route) {
        headers.insert("x-route-name", value);
    }
    response
}

pub(crate) fn require_text(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(())
}
