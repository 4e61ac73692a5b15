//! Database repository for users, sessions, clients, badges, documents and
//! the audit trail.
//!
//! Every update that changes an audited entity runs on one transaction that
//! also carries its history records.

use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool, Transaction};

use super::{fetch_bug, fetch_project};
use crate::audit::{
    audited_update, reconcile, record_history, Association, Audited, BUG_BADGES, BUG_DOCUMENTS,
    PROJECT_BADGES, PROJECT_DOCUMENTS,
};
use crate::errors::AppError;
use crate::models::{
    Badge, BadgeRequest, Bug, Color, Document, DocumentCategory, DocumentView, HistoryEntry,
    ObjectKind, Organisation, OrganisationRequest, Project, Token, User, UserCredentials,
};

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pub(super) pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a transaction holding the write lock from its first statement.
    /// A deferred transaction that reads first cannot upgrade to a writer
    /// once another connection has committed, and fails without waiting on
    /// the busy timeout.
    pub(super) async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>, AppError> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    // ==================== USER OPERATIONS ====================

    /// List all users.
    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let rows = sqlx::query("SELECT id, username FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(user_from_row).collect())
    }

    /// Get a user by ID.
    pub async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let mut conn = self.pool.acquire().await?;
        fetch_user(&mut conn, id).await
    }

    /// Get a user together with the stored password hash.
    pub async fn find_credentials(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, AppError> {
        let row = sqlx::query("SELECT id, username, password_hash FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| UserCredentials {
            id: row.get("id"),
            username: row.get("username"),
            password_hash: row.get("password_hash"),
        }))
    }

    /// Create a user. A taken username is a conflict.
    pub async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, AppError> {
        let result = sqlx::query("INSERT INTO users (username, password_hash) VALUES (?, ?)")
            .bind(username)
            .bind(password_hash)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) => Ok(User {
                id: done.last_insert_rowid(),
                username: username.to_string(),
            }),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(AppError::Conflict(
                "Username or Email already registered.".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    // ==================== TOKEN OPERATIONS ====================

    /// Persist an issued session token.
    pub async fn store_token(
        &self,
        token: &str,
        user_id: i64,
        expires_at: &str,
    ) -> Result<Token, AppError> {
        let result = sqlx::query(
            "INSERT INTO tokens (token, user_id, expires_at, force_expiration, is_refresh) VALUES (?, ?, ?, 0, 0)",
        )
        .bind(token)
        .bind(user_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(Token {
            id: result.last_insert_rowid(),
            token: token.to_string(),
            user_id,
            expires_at: expires_at.to_string(),
            force_expiration: false,
            is_refresh: false,
        })
    }

    /// Look up a stored token.
    pub async fn find_token(&self, token: &str) -> Result<Option<Token>, AppError> {
        let row = sqlx::query(
            "SELECT id, token, user_id, expires_at, force_expiration, is_refresh FROM tokens WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let force_expiration: i32 = row.get("force_expiration");
            let is_refresh: i32 = row.get("is_refresh");
            Token {
                id: row.get("id"),
                token: row.get("token"),
                user_id: row.get("user_id"),
                expires_at: row.get("expires_at"),
                force_expiration: force_expiration != 0,
                is_refresh: is_refresh != 0,
            }
        }))
    }

    /// Mark a token as revoked. Unknown tokens are ignored.
    pub async fn expire_token(&self, token: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE tokens SET force_expiration = 1 WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ==================== ORGANISATION OPERATIONS ====================

    /// List organisations, optionally only the one with `client_id`.
    pub async fn list_organisations(
        &self,
        client_id: Option<i64>,
    ) -> Result<Vec<Organisation>, AppError> {
        let rows = match client_id {
            Some(id) => {
                sqlx::query("SELECT id, name, is_internal FROM organisations WHERE id = ?")
                    .bind(id)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT id, name, is_internal FROM organisations ORDER BY name")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(rows.iter().map(organisation_from_row).collect())
    }

    /// Update the organisation named by `request.id`, or get-or-create one by
    /// name and flag.
    pub async fn save_organisation(
        &self,
        request: &OrganisationRequest,
    ) -> Result<Organisation, AppError> {
        let mut tx = self.begin_write().await?;

        let organisation = match request.id {
            Some(id) => {
                let existing = fetch_organisation(&mut tx, id)
                    .await?
                    .ok_or_else(|| AppError::not_found(Organisation::CLASS, id))?;
                audited_update(&mut tx, existing, request).await?.entity
            }
            None => {
                let row = sqlx::query(
                    "SELECT id, name, is_internal FROM organisations WHERE name = ? AND is_internal = ?",
                )
                .bind(&request.name)
                .bind(request.is_internal as i32)
                .fetch_optional(&mut *tx)
                .await?;

                match row {
                    Some(row) => organisation_from_row(&row),
                    None => {
                        let result = sqlx::query(
                            "INSERT INTO organisations (name, is_internal) VALUES (?, ?)",
                        )
                        .bind(&request.name)
                        .bind(request.is_internal as i32)
                        .execute(&mut *tx)
                        .await?;
                        Organisation {
                            id: result.last_insert_rowid(),
                            name: request.name.clone(),
                            is_internal: request.is_internal,
                        }
                    }
                }
            }
        };

        tx.commit().await?;
        Ok(organisation)
    }

    /// Delete organisations (and, by cascade, their projects).
    pub async fn delete_organisations(&self, ids: &[i64]) -> Result<u64, AppError> {
        delete_where_id_in(&self.pool, "organisations", ids).await
    }

    // ==================== BADGE OPERATIONS ====================

    /// List all badges.
    pub async fn list_badges(&self) -> Result<Vec<Badge>, AppError> {
        let rows = sqlx::query("SELECT id, label, color FROM badges ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(badge_from_row).collect())
    }

    /// Get or create the badge `{label, color}` and add it to the badges of
    /// the target project or bug, recording the association change.
    pub async fn attach_badge(&self, request: &BadgeRequest) -> Result<Badge, AppError> {
        let mut tx = self.begin_write().await?;

        let (class, association) = match request.object_type {
            ObjectKind::Project => {
                fetch_project(&mut tx, request.object_id)
                    .await?
                    .ok_or_else(|| AppError::not_found(Project::CLASS, request.object_id))?;
                (Project::CLASS, &PROJECT_BADGES)
            }
            ObjectKind::Bug => {
                fetch_bug(&mut tx, request.object_id)
                    .await?
                    .ok_or_else(|| AppError::not_found(Bug::CLASS, request.object_id))?;
                (Bug::CLASS, &BUG_BADGES)
            }
        };

        let existing = sqlx::query("SELECT id, label, color FROM badges WHERE label = ? AND color = ?")
            .bind(&request.label)
            .bind(request.color.as_str())
            .fetch_optional(&mut *tx)
            .await?;
        let badge = match existing {
            Some(row) => badge_from_row(&row),
            None => {
                let result = sqlx::query("INSERT INTO badges (label, color) VALUES (?, ?)")
                    .bind(&request.label)
                    .bind(request.color.as_str())
                    .execute(&mut *tx)
                    .await?;
                Badge {
                    id: result.last_insert_rowid(),
                    label: request.label.clone(),
                    color: request.color,
                }
            }
        };

        add_member(&mut tx, class, request.object_id, association, badge.id).await?;

        tx.commit().await?;
        Ok(badge)
    }

    // ==================== DOCUMENT OPERATIONS ====================

    /// Store a document row and attach it to its project or bug, recording
    /// the association change.
    pub async fn attach_document(
        &self,
        category: DocumentCategory,
        owner_id: i64,
        name: &str,
        original_name: &str,
        path: &str,
    ) -> Result<Document, AppError> {
        let mut tx = self.begin_write().await?;

        let (class, association) = match category {
            DocumentCategory::Project => {
                fetch_project(&mut tx, owner_id)
                    .await?
                    .ok_or_else(|| AppError::not_found(Project::CLASS, owner_id))?;
                (Project::CLASS, &PROJECT_DOCUMENTS)
            }
            DocumentCategory::Bug => {
                fetch_bug(&mut tx, owner_id)
                    .await?
                    .ok_or_else(|| AppError::not_found(Bug::CLASS, owner_id))?;
                (Bug::CLASS, &BUG_DOCUMENTS)
            }
        };

        let result = sqlx::query(
            "INSERT INTO documents (name, original_name, category, path) VALUES (?, ?, ?, ?)",
        )
        .bind(name)
        .bind(original_name)
        .bind(category.as_str())
        .bind(path)
        .execute(&mut *tx)
        .await?;
        let document = Document {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            original_name: original_name.to_string(),
            category,
            path: path.to_string(),
        };

        add_member(&mut tx, class, owner_id, association, document.id).await?;

        tx.commit().await?;
        Ok(document)
    }

    // ==================== HISTORY OPERATIONS ====================

    /// Audit trail entries for one object, every object of a class, or
    /// everything when `object_class` is `all`. Oldest first.
    pub async fn list_history(
        &self,
        object_class: &str,
        object_id: Option<i64>,
    ) -> Result<Vec<HistoryEntry>, AppError> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT object_class, object_id, attribute_name, attribute_type, attribute_prior_state, \
             attribute_new_state, date_created FROM object_history",
        );
        if !object_class.eq_ignore_ascii_case("all") {
            query.push(" WHERE object_class = ").push_bind(object_class);
            if let Some(id) = object_id {
                query.push(" AND object_id = ").push_bind(id);
            }
        }
        query.push(" ORDER BY id");

        let rows = query.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(history_from_row).collect())
    }
}

/// Add one member to an association, keeping the existing ones, and record
/// the change.
async fn add_member(
    conn: &mut SqliteConnection,
    owner_class: &str,
    owner_id: i64,
    association: &Association,
    member_id: i64,
) -> Result<(), AppError> {
    let mut ids: Vec<i64> = association
        .members(conn, owner_id)
        .await?
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    ids.push(member_id);

    let outcome = reconcile(conn, owner_class, owner_id, association, Some(ids.as_slice())).await?;
    if let Some(record) = outcome.record {
        record_history(conn, &[record]).await?;
    }
    Ok(())
}

/// Link the resolvable ids to a freshly created owner without recording
/// history. Returns the ids that matched no row.
pub(super) async fn link_existing(
    conn: &mut SqliteConnection,
    association: &Association,
    owner_id: i64,
    ids: Option<&[i64]>,
) -> Result<Vec<i64>, AppError> {
    let ids = ids.unwrap_or(&[]);
    let members = association.target.resolve(conn, ids).await?;
    let ignored: Vec<i64> = ids
        .iter()
        .filter(|id| !members.iter().any(|(member_id, _)| member_id == *id))
        .copied()
        .collect();
    if !ignored.is_empty() {
        tracing::warn!(
            "Ignoring unknown {} ids {:?} for new {} {}",
            association.target.class,
            ignored,
            association.owner_column,
            owner_id
        );
    }
    if members.is_empty() {
        return Ok(ignored);
    }

    let mut query = QueryBuilder::<Sqlite>::new(format!(
        "INSERT OR IGNORE INTO {} ({}, {}) ",
        association.join_table, association.owner_column, association.member_column
    ));
    query.push_values(&members, |mut row, (member_id, _)| {
        row.push_bind(owner_id).push_bind(*member_id);
    });
    query.build().execute(&mut *conn).await?;
    Ok(ignored)
}

pub(super) async fn delete_where_id_in(
    pool: &SqlitePool,
    table: &str,
    ids: &[i64],
) -> Result<u64, AppError> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut query = QueryBuilder::<Sqlite>::new(format!("DELETE FROM {} WHERE id IN (", table));
    let mut list = query.separated(", ");
    for id in ids {
        list.push_bind(*id);
    }
    list.push_unseparated(")");

    let result = query.build().execute(pool).await?;
    tracing::info!("Deleted {} rows from {}", result.rows_affected(), table);
    Ok(result.rows_affected())
}

pub async fn fetch_user(conn: &mut SqliteConnection, id: i64) -> Result<Option<User>, AppError> {
    let row = sqlx::query("SELECT id, username FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.as_ref().map(user_from_row))
}

pub async fn fetch_organisation(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<Organisation>, AppError> {
    let row = sqlx::query("SELECT id, name, is_internal FROM organisations WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.as_ref().map(organisation_from_row))
}

/// Badges attached through `association`.
pub(super) async fn badges_of(
    conn: &mut SqliteConnection,
    association: &Association,
    owner_id: i64,
) -> Result<Vec<Badge>, AppError> {
    let sql = format!(
        "SELECT b.id, b.label, b.color FROM badges b JOIN {} j ON j.{} = b.id WHERE j.{} = ? ORDER BY b.id",
        association.join_table, association.member_column, association.owner_column
    );
    let rows = sqlx::query(&sql)
        .bind(owner_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.iter().map(badge_from_row).collect())
}

/// Documents attached through `association`.
pub(super) async fn documents_of(
    conn: &mut SqliteConnection,
    association: &Association,
    owner_id: i64,
) -> Result<Vec<DocumentView>, AppError> {
    let sql = format!(
        "SELECT d.id, d.name, d.original_name, d.category, d.path FROM documents d \
         JOIN {} j ON j.{} = d.id WHERE j.{} = ? ORDER BY d.id",
        association.join_table, association.member_column, association.owner_column
    );
    let rows = sqlx::query(&sql)
        .bind(owner_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows
        .iter()
        .map(|row| DocumentView::from(&document_from_row(row)))
        .collect())
}

/// Users attached through `association`.
pub(super) async fn users_of(
    conn: &mut SqliteConnection,
    association: &Association,
    owner_id: i64,
) -> Result<Vec<User>, AppError> {
    let sql = format!(
        "SELECT u.id, u.username FROM users u JOIN {} j ON j.{} = u.id WHERE j.{} = ? ORDER BY u.id",
        association.join_table, association.member_column, association.owner_column
    );
    let rows = sqlx::query(&sql)
        .bind(owner_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.iter().map(user_from_row).collect())
}

// Helper functions for row conversion

pub(super) fn user_from_row(row: &SqliteRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
    }
}

fn organisation_from_row(row: &SqliteRow) -> Organisation {
    let is_internal: i32 = row.get("is_internal");
    Organisation {
        id: row.get("id"),
        name: row.get("name"),
        is_internal: is_internal != 0,
    }
}

fn badge_from_row(row: &SqliteRow) -> Badge {
    let color: String = row.get("color");
    Badge {
        id: row.get("id"),
        label: row.get("label"),
        color: Color::parse(&color).unwrap_or_default(),
    }
}

fn document_from_row(row: &SqliteRow) -> Document {
    let category: String = row.get("category");
    Document {
        id: row.get("id"),
        name: row.get("name"),
        original_name: row.get("original_name"),
        category: DocumentCategory::parse(&category).unwrap_or_default(),
        path: row.get("path"),
    }
}

fn history_from_row(row: &SqliteRow) -> HistoryEntry {
    let record = crate::models::AuditRecord {
        object_class: row.get("object_class"),
        object_id: row.get("object_id"),
        attribute_name: row.get("attribute_name"),
        attribute_type: row.get("attribute_type"),
        attribute_prior_state: row.get("attribute_prior_state"),
        attribute_new_state: row.get("attribute_new_state"),
        created_at: row.get("date_created"),
    };
    HistoryEntry::from(&record)
}
