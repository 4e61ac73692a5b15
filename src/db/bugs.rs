//! Bug persistence, including the bulk close.

use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};

use super::repository::{badges_of, documents_of, fetch_user, link_existing, users_of};
use super::{fetch_project, Repository};
use crate::audit::{
    audited_update, record_history, timestamp, Audited, BUG_ALLOCATED_TO, BUG_BADGES,
    BUG_DOCUMENTS, USERS,
};
use crate::errors::AppError;
use crate::models::{AuditRecord, Bug, BugDetail, BugRequest, Priority, Project, Saved, Status};

const BUG_COLUMNS: &str =
    "id, content, status, priority, owner_id, project_id, date_created, date_updated";

impl Repository {
    /// Create a bug owned by `owner_id`, or run an audited update when the
    /// request carries an id.
    pub async fn save_bug(
        &self,
        request: &BugRequest,
        owner_id: i64,
    ) -> Result<Saved<BugDetail>, AppError> {
        let mut tx = self.begin_write().await?;

        let (bug, ignored_ids) = match request.id {
            Some(id) => {
                let existing = fetch_bug(&mut tx, id)
                    .await?
                    .ok_or_else(|| AppError::not_found(Bug::CLASS, id))?;
                let outcome = audited_update(&mut tx, existing, request).await?;
                tracing::info!(
                    "Updated bug {} ({} history records)",
                    id,
                    outcome.records.len()
                );
                (outcome.entity, outcome.dropped_ids)
            }
            None => create_bug(&mut tx, request, owner_id).await?,
        };

        let detail = bug_detail(&mut tx, bug).await?;
        tx.commit().await?;
        Ok(Saved {
            item: detail,
            ignored_ids,
        })
    }

    /// Close every open bug among `ids`, recording one status change per bug
    /// actually closed. Returns the ids closed.
    pub async fn close_bugs(&self, ids: &[i64]) -> Result<Vec<i64>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.begin_write().await?;
        let now = timestamp();

        let mut query = QueryBuilder::<Sqlite>::new("UPDATE bugs SET status = ");
        query
            .push_bind(Status::Closed.as_str())
            .push(", date_updated = ")
            .push_bind(now.clone())
            .push(" WHERE status = ")
            .push_bind(Status::Open.as_str())
            .push(" AND id IN (");
        let mut list = query.separated(", ");
        for id in ids {
            list.push_bind(*id);
        }
        list.push_unseparated(") RETURNING id");

        let mut closed: Vec<i64> = query
            .build()
            .fetch_all(&mut *tx)
            .await?
            .iter()
            .map(|row| row.get("id"))
            .collect();
        closed.sort_unstable();

        let records: Vec<AuditRecord> = closed
            .iter()
            .map(|id| AuditRecord {
                object_class: Bug::CLASS.to_string(),
                object_id: *id,
                attribute_name: "status".to_string(),
                attribute_type: "Status".to_string(),
                attribute_prior_state: Status::Open.as_str().to_string(),
                attribute_new_state: Status::Closed.as_str().to_string(),
                created_at: now.clone(),
            })
            .collect();
        record_history(&mut tx, &records).await?;

        tx.commit().await?;
        tracing::info!("Closed {} of {} requested bugs", closed.len(), ids.len());
        Ok(closed)
    }
}

async fn create_bug(
    conn: &mut SqliteConnection,
    request: &BugRequest,
    owner_id: i64,
) -> Result<(Bug, Vec<i64>), AppError> {
    fetch_project(conn, request.project_id)
        .await?
        .ok_or_else(|| AppError::not_found(Project::CLASS, request.project_id))?;

    let now = timestamp();
    let result = sqlx::query(
        "INSERT INTO bugs (content, status, priority, owner_id, project_id, date_created, date_updated) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&request.content)
    .bind(request.status.as_str())
    .bind(request.priority.as_str())
    .bind(owner_id)
    .bind(request.project_id)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;
    let id = result.last_insert_rowid();

    // Creation is not audited; initial members are linked directly
    let mut ignored_ids =
        link_existing(conn, &BUG_ALLOCATED_TO, id, request.allocated_to_ids.as_deref()).await?;
    ignored_ids.extend(link_existing(conn, &BUG_BADGES, id, request.badge_ids.as_deref()).await?);

    tracing::info!("Created bug {} in project {}", id, request.project_id);
    let bug = Bug {
        id,
        content: request.content.clone(),
        status: request.status,
        priority: request.priority,
        owner_id,
        project_id: request.project_id,
        date_created: now.clone(),
        date_updated: now,
    };
    Ok((bug, ignored_ids))
}

pub(super) async fn bug_detail(conn: &mut SqliteConnection, bug: Bug) -> Result<BugDetail, AppError> {
    let owner = fetch_user(conn, bug.owner_id)
        .await?
        .ok_or_else(|| AppError::not_found(USERS.class, bug.owner_id))?;
    let allocated_to = users_of(conn, &BUG_ALLOCATED_TO, bug.id).await?;
    let badges = badges_of(conn, &BUG_BADGES, bug.id).await?;
    let documents = documents_of(conn, &BUG_DOCUMENTS, bug.id).await?;

    Ok(BugDetail {
        id: bug.id,
        project_id: bug.project_id,
        content: bug.content,
        status: bug.status,
        priority: bug.priority,
        owner,
        allocated_to,
        badges,
        documents,
        date_created: bug.date_created,
        date_updated: bug.date_updated,
    })
}

pub(super) async fn bug_details_for_project(
    conn: &mut SqliteConnection,
    project_id: i64,
) -> Result<Vec<BugDetail>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM bugs WHERE project_id = ? ORDER BY id",
        BUG_COLUMNS
    ))
    .bind(project_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut details = Vec::with_capacity(rows.len());
    for row in &rows {
        details.push(bug_detail(conn, bug_from_row(row)).await?);
    }
    Ok(details)
}

pub async fn fetch_bug(conn: &mut SqliteConnection, id: i64) -> Result<Option<Bug>, AppError> {
    let row = sqlx::query(&format!("SELECT {} FROM bugs WHERE id = ?", BUG_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.as_ref().map(bug_from_row))
}

fn bug_from_row(row: &SqliteRow) -> Bug {
    let status: String = row.get("status");
    let priority: String = row.get("priority");
    Bug {
        id: row.get("id"),
        content: row.get("content"),
        status: Status::parse(&status).unwrap_or_default(),
        priority: Priority::parse(&priority).unwrap_or_default(),
        owner_id: row.get("owner_id"),
        project_id: row.get("project_id"),
        date_created: row.get("date_created"),
        date_updated: row.get("date_updated"),
    }
}
