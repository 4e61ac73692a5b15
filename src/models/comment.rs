//! Comment, thread and thread reply models.
//!
//! Threads share the comment shape; replies additionally point at a thread.

use serde::{Deserialize, Serialize};

use super::User;

/// A comment or thread as returned by listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: i64,
    pub content: String,
    pub author: User,
    pub date_created: String,
    pub date_updated: String,
}

/// A reply within a thread.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadReplyView {
    pub id: i64,
    pub thread_id: i64,
    pub content: String,
    pub author: User,
    pub date_created: String,
    pub date_updated: String,
}

/// Request body for a new comment or thread. A bug id takes precedence over a
/// project id; one of the two is required.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRequest {
    pub content: String,
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default)]
    pub bug_id: Option<i64>,
}

/// Request body for a new thread reply.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadReplyRequest {
    pub thread_id: i64,
    pub content: String,
}

/// Query parameters selecting a thread.
#[derive(Debug, Clone, Deserialize)]
pub struct ThreadQuery {
    pub thread_id: i64,
}
