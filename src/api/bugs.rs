//! Bug API endpoints.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Serialize;

use super::{require_text, success, ApiResult};
use crate::auth::RequireUser;
use crate::models::{BugDetail, BugQuery, BugRequest, CommentView, IdsRequest, Saved};
use crate::AppState;

/// Ids a bulk close actually transitioned.
#[derive(Debug, Serialize)]
pub struct ClosedBugs {
    pub closed: Vec<i64>,
}

/// POST /api/v1/projects/bugs - Create a bug, or update it when an id is
/// given. Unknown allocation or badge ids are listed in `ignoredIds`.
pub async fn save_bug(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(request): Json<BugRequest>,
) -> ApiResult<Saved<BugDetail>> {
    require_text(&request.content, "Content")?;
    success(state.repo.save_bug(&request, user.id).await?)
}

/// DELETE /api/v1/projects/bugs - Close the open bugs among the given ids.
pub async fn close_bugs(
    State(state): State<AppState>,
    Json(request): Json<IdsRequest>,
) -> ApiResult<ClosedBugs> {
    let closed = state.repo.close_bugs(&request.ids).await?;
    success(ClosedBugs { closed })
}

/// GET /api/v1/projects/bugs/comments - Comments on a bug.
pub async fn bug_comments(
    State(state): State<AppState>,
    Query(query): Query<BugQuery>,
) -> ApiResult<Vec<CommentView>> {
    success(state.repo.list_bug_comments(query.bug_id).await?)
}

/// GET /api/v1/projects/bugs/threads - Threads on a bug.
pub async fn bug_threads(
    State(state): State<AppState>,
    Query(query): Query<BugQuery>,
) -> ApiResult<Vec<CommentView>> {
    success(state.repo.list_bug_threads(query.bug_id).await?)
}
