//! Project persistence.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use super::repository::{
    badges_of, delete_where_id_in, documents_of, fetch_organisation, fetch_user, link_existing,
};
use super::bugs::bug_details_for_project;
use super::discussion::{posts_for, COMMENTS, THREADS};
use super::Repository;
use crate::audit::{audited_update, timestamp, Audited, ORGANISATIONS, PROJECT_BADGES, PROJECT_DOCUMENTS, USERS};
use crate::errors::AppError;
use crate::models::{
    Priority, Project, ProjectDetail, ProjectListing, ProjectQuery, ProjectRequest, Saved, Status,
};

const PROJECT_COLUMNS: &str =
    "id, name, status, priority, author_id, client_id, date_created, date_updated";

impl Repository {
    /// Project listings, optionally restricted to one client.
    pub async fn list_projects(&self, query: &ProjectQuery) -> Result<Vec<ProjectListing>, AppError> {
        let mut conn = self.pool.acquire().await?;

        let rows = match query.client_id {
            Some(client_id) => {
                sqlx::query(&format!(
                    "SELECT {} FROM projects WHERE client_id = ? ORDER BY id",
                    PROJECT_COLUMNS
                ))
                .bind(client_id)
                .fetch_all(&mut *conn)
                .await?
            }
            None => {
                sqlx::query(&format!("SELECT {} FROM projects ORDER BY id", PROJECT_COLUMNS))
                    .fetch_all(&mut *conn)
                    .await?
            }
        };

        let mut listings = Vec::with_capacity(rows.len());
        for row in &rows {
            listings.push(project_listing(&mut conn, project_from_row(row)).await?);
        }
        Ok(listings)
    }

    /// Full project view with bugs, comments and threads.
    pub async fn get_project(&self, id: i64) -> Result<ProjectDetail, AppError> {
        let mut conn = self.pool.acquire().await?;

        let project = fetch_project(&mut conn, id)
            .await?
            .ok_or_else(|| AppError::not_found(Project::CLASS, id))?;
        let listing = project_listing(&mut conn, project).await?;
        let bugs = bug_details_for_project(&mut conn, id).await?;
        let comments = posts_for(&mut conn, &COMMENTS, "project_id", id).await?;
        let threads = posts_for(&mut conn, &THREADS, "project_id", id).await?;

        Ok(ProjectDetail {
            listing,
            bugs,
            comments,
            threads,
        })
    }

    /// Create a project authored by `author_id`, or run an audited update
    /// when the request carries an id.
    pub async fn save_project(
        &self,
        request: &ProjectRequest,
        author_id: i64,
    ) -> Result<Saved<ProjectListing>, AppError> {
        let mut tx = self.begin_write().await?;

        let (project, ignored_ids) = match request.id {
            Some(id) => {
                let existing = fetch_project(&mut tx, id)
                    .await?
                    .ok_or_else(|| AppError::not_found(Project::CLASS, id))?;
                let outcome = audited_update(&mut tx, existing, request).await?;
                tracing::info!(
                    "Updated project {} ({} history records)",
                    id,
                    outcome.records.len()
                );
                (outcome.entity, outcome.dropped_ids)
            }
            None => create_project(&mut tx, request, author_id).await?,
        };

        let listing = project_listing(&mut tx, project).await?;
        tx.commit().await?;
        Ok(Saved {
            item: listing,
            ignored_ids,
        })
    }

    /// Delete projects by id. Returns the number removed.
    pub async fn delete_projects(&self, ids: &[i64]) -> Result<u64, AppError> {
        delete_where_id_in(&self.pool, "projects", ids).await
    }
}

async fn create_project(
    conn: &mut SqliteConnection,
    request: &ProjectRequest,
    author_id: i64,
) -> Result<(Project, Vec<i64>), AppError> {
    fetch_organisation(conn, request.client_id)
        .await?
        .ok_or_else(|| AppError::not_found(ORGANISATIONS.class, request.client_id))?;

    let now = timestamp();
    let result = sqlx::query(
        "INSERT INTO projects (name, status, priority, author_id, client_id, date_created, date_updated) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&request.name)
    .bind(request.status.as_str())
    .bind(request.priority.as_str())
    .bind(author_id)
    .bind(request.client_id)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;
    let id = result.last_insert_rowid();

    // Creation is not audited; the initial badges are linked directly
    let ignored_ids =
        link_existing(conn, &PROJECT_BADGES, id, request.badge_ids.as_deref()).await?;

    tracing::info!("Created project {} '{}'", id, request.name);
    let project = Project {
        id,
        name: request.name.clone(),
        status: request.status,
        priority: request.priority,
        author_id,
        client_id: request.client_id,
        date_created: now.clone(),
        date_updated: now,
    };
    Ok((project, ignored_ids))
}

async fn project_listing(
    conn: &mut SqliteConnection,
    project: Project,
) -> Result<ProjectListing, AppError> {
    let author = fetch_user(conn, project.author_id)
        .await?
        .ok_or_else(|| AppError::not_found(USERS.class, project.author_id))?;
    let client = fetch_organisation(conn, project.client_id)
        .await?
        .ok_or_else(|| AppError::not_found(ORGANISATIONS.class, project.client_id))?;
    let badges = badges_of(conn, &PROJECT_BADGES, project.id).await?;
    let documents = documents_of(conn, &PROJECT_DOCUMENTS, project.id).await?;

    let counts = sqlx::query(
        "SELECT (SELECT COUNT(*) FROM bugs WHERE project_id = ?) AS bug_count, \
                (SELECT COUNT(*) FROM comments WHERE project_id = ?) AS comment_count",
    )
    .bind(project.id)
    .bind(project.id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(ProjectListing {
        id: project.id,
        name: project.name,
        status: project.status,
        priority: project.priority,
        author,
        client,
        badges,
        documents,
        date_created: project.date_created,
        date_updated: project.date_updated,
        bug_count: counts.get("bug_count"),
        comment_count: counts.get("comment_count"),
    })
}

pub async fn fetch_project(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<Project>, AppError> {
    let row = sqlx::query(&format!("SELECT {} FROM projects WHERE id = ?", PROJECT_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.as_ref().map(project_from_row))
}

fn project_from_row(row: &SqliteRow) -> Project {
    let status: String = row.get("status");
    let priority: String = row.get("priority");
    Project {
        id: row.get("id"),
        name: row.get("name"),
        status: Status::parse(&status).unwrap_or_default(),
        priority: Priority::parse(&priority).unwrap_or_default(),
        author_id: row.get("author_id"),
        client_id: row.get("client_id"),
        date_created: row.get("date_created"),
        date_updated: row.get("date_updated"),
    }
}
