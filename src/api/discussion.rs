//! Comment and thread API endpoints.

use axum::{
    extract::{Query, State},
    Json,
};

use super::{require_text, success, ApiResult};
use crate::auth::RequireUser;
use crate::models::{CommentRequest, CommentView, ThreadQuery, ThreadReplyRequest, ThreadReplyView};
use crate::AppState;

/// POST /api/v1/projects/comments - Comment on a bug or project.
pub async fn create_comment(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(request): Json<CommentRequest>,
) -> ApiResult<CommentView> {
    require_text(&request.content, "Content")?;
    success(state.repo.create_comment(&request, &user).await?)
}

/// POST /api/v1/projects/threads - Open a thread on a bug or project.
pub async fn create_thread(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(request): Json<CommentRequest>,
) -> ApiResult<CommentView> {
    require_text(&request.content, "Content")?;
    success(state.repo.create_thread(&request, &user).await?)
}

/// GET /api/v1/projects/threads/replies - Replies in a thread.
pub async fn thread_replies(
    State(state): State<AppState>,
    Query(query): Query<ThreadQuery>,
) -> ApiResult<Vec<ThreadReplyView>> {
    success(state.repo.list_thread_replies(query.thread_id).await?)
}

/// POST /api/v1/projects/threads/replies - Reply to a thread; returns all of
/// its replies.
pub async fn create_thread_reply(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(request): Json<ThreadReplyRequest>,
) -> ApiResult<Vec<ThreadReplyView>> {
    require_text(&request.content, "Content")?;
    success(state.repo.create_thread_reply(&request, &user).await?)
}
