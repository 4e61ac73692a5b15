//! Badge API endpoints.

use axum::{extract::State, Json};

use super::{require_text, success, ApiResult};
use crate::auth::RequireUser;
use crate::models::{Badge, BadgeRequest};
use crate::AppState;

/// GET /api/v1/projects/badges - List all badges.
pub async fn list_badges(State(state): State<AppState>) -> ApiResult<Vec<Badge>> {
    success(state.repo.list_badges().await?)
}

/// POST /api/v1/projects/badges - Attach a badge to a project or bug,
/// creating it if needed.
pub async fn attach_badge(
    State(state): State<AppState>,
    RequireUser(_user): RequireUser,
    Json(request): Json<BadgeRequest>,
) -> ApiResult<Badge> {
    require_text(&request.label, "Label")?;
    success(state.repo.attach_badge(&request).await?)
}
