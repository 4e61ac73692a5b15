//! Bug models.

use serde::{Deserialize, Serialize};

use super::{Badge, DocumentView, Priority, Status, User};

/// A bug row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bug {
    pub id: i64,
    pub content: String,
    pub status: Status,
    pub priority: Priority,
    pub owner_id: i64,
    pub project_id: i64,
    pub date_created: String,
    pub date_updated: String,
}

/// Create-or-update payload. Present `id` means audited update; absent or
/// empty id lists clear the corresponding association on update.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BugRequest {
    #[serde(default)]
    pub id: Option<i64>,
    pub content: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub priority: Priority,
    pub project_id: i64,
    #[serde(default)]
    pub allocated_to_ids: Option<Vec<i64>>,
    #[serde(default)]
    pub badge_ids: Option<Vec<i64>>,
}

/// Bug with owner, allocations, badges and documents resolved.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BugDetail {
    pub id: i64,
    pub project_id: i64,
    pub content: String,
    pub status: Status,
    pub priority: Priority,
    pub owner: User,
    pub allocated_to: Vec<User>,
    pub badges: Vec<Badge>,
    pub documents: Vec<DocumentView>,
    pub date_created: String,
    pub date_updated: String,
}

/// Query parameters selecting a bug.
#[derive(Debug, Clone, Deserialize)]
pub struct BugQuery {
    pub bug_id: i64,
}
