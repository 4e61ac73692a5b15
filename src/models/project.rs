//! Project models.

use serde::{Deserialize, Serialize};

use super::{Badge, BugDetail, CommentView, DocumentView, Organisation, Priority, Status, User};

/// A project row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub status: Status,
    pub priority: Priority,
    pub author_id: i64,
    pub client_id: i64,
    pub date_created: String,
    pub date_updated: String,
}

/// Create-or-update payload. Present `id` means audited update; an absent or
/// empty `badgeIds` clears the project's badges on update.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRequest {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub priority: Priority,
    pub client_id: i64,
    #[serde(default)]
    pub badge_ids: Option<Vec<i64>>,
}

/// Project as listed, with related summaries and counts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectListing {
    pub id: i64,
    pub name: String,
    pub status: Status,
    pub priority: Priority,
    pub author: User,
    pub client: Organisation,
    pub badges: Vec<Badge>,
    pub documents: Vec<DocumentView>,
    pub date_created: String,
    pub date_updated: String,
    pub bug_count: i64,
    pub comment_count: i64,
}

/// Full project view including bugs and discussion.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub listing: ProjectListing,
    pub bugs: Vec<BugDetail>,
    pub comments: Vec<CommentView>,
    pub threads: Vec<CommentView>,
}

/// Query parameters for the project listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectQuery {
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default)]
    pub client_id: Option<i64>,
}
