//! Database fixtures for engine and reconciler tests.

use sqlx::{Row, SqliteConnection, SqlitePool};
use tempfile::TempDir;

use super::timestamp;
use crate::db::{fetch_bug, fetch_project, init_database};
use crate::models::{Bug, Project};

pub struct Fixture {
    pub user_id: i64,
    pub client_id: i64,
    pub project_id: i64,
}

pub async fn test_pool() -> (TempDir, SqlitePool) {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("test.sqlite")).await.unwrap();
    (dir, pool)
}

pub async fn seed_user(conn: &mut SqliteConnection, username: &str) -> i64 {
    sqlx::query("INSERT INTO users (username, password_hash) VALUES (?, 'x')")
        .bind(username)
        .execute(&mut *conn)
        .await
        .unwrap()
        .last_insert_rowid()
}

pub async fn seed_organisation(conn: &mut SqliteConnection, name: &str) -> i64 {
    sqlx::query("INSERT INTO organisations (name, is_internal) VALUES (?, 0)")
        .bind(name)
        .execute(&mut *conn)
        .await
        .unwrap()
        .last_insert_rowid()
}

pub async fn seed_badge(conn: &mut SqliteConnection, label: &str) -> i64 {
    sqlx::query("INSERT INTO badges (label, color) VALUES (?, 'blue')")
        .bind(label)
        .execute(&mut *conn)
        .await
        .unwrap()
        .last_insert_rowid()
}

/// User `owner`, client `Acme` and project `Apollo`.
pub async fn seed_project(conn: &mut SqliteConnection) -> Fixture {
    let user_id = seed_user(conn, "owner").await;
    let client_id = seed_organisation(conn, "Acme").await;
    let now = timestamp();
    let project_id = sqlx::query(
        "INSERT INTO projects (name, status, priority, author_id, client_id, date_created, date_updated) \
         VALUES ('Apollo', 'Open', 'High', ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(client_id)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await
    .unwrap()
    .last_insert_rowid();

    Fixture {
        user_id,
        client_id,
        project_id,
    }
}

pub async fn seed_bug(
    conn: &mut SqliteConnection,
    project_id: i64,
    owner_id: i64,
    content: &str,
) -> Bug {
    let now = timestamp();
    let id = sqlx::query(
        "INSERT INTO bugs (content, status, priority, owner_id, project_id, date_created, date_updated) \
         VALUES (?, 'Open', 'High', ?, ?, ?, ?)",
    )
    .bind(content)
    .bind(owner_id)
    .bind(project_id)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await
    .unwrap()
    .last_insert_rowid();
    load_bug(conn, id).await
}

pub async fn load_bug(conn: &mut SqliteConnection, id: i64) -> Bug {
    fetch_bug(conn, id).await.unwrap().unwrap()
}

pub async fn load_project(conn: &mut SqliteConnection, id: i64) -> Project {
    fetch_project(conn, id).await.unwrap().unwrap()
}

pub async fn history_count(conn: &mut SqliteConnection) -> i64 {
    sqlx::query("SELECT COUNT(*) AS n FROM object_history")
        .fetch_one(&mut *conn)
        .await
        .unwrap()
        .get("n")
}
