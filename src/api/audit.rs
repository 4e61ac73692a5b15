//! Audit trail endpoint.

use axum::extract::{Query, State};

use super::{success, ApiResult};
use crate::models::{AuditTrailQuery, HistoryEntry};
use crate::AppState;

/// GET /api/v1/projects/audit_trails - Change history for an object, a class
/// of objects, or everything with `object_class=all`.
pub async fn audit_trails(
    State(state): State<AppState>,
    Query(query): Query<AuditTrailQuery>,
) -> ApiResult<Vec<HistoryEntry>> {
    success(
        state
            .repo
            .list_history(&query.object_class, query.object_id)
            .await?,
    )
}
