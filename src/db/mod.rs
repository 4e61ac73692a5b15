//! Database module for SQLite persistence.
//!
//! SQLite is the source of truth for all application data, including the
//! append-only change history.

mod bugs;
mod discussion;
mod projects;
mod repository;

pub use bugs::fetch_bug;
pub use projects::fetch_project;
pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run embedded migrations
    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tokens (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            token TEXT NOT NULL,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            expires_at TEXT NOT NULL,
            force_expiration INTEGER NOT NULL DEFAULT 0,
            is_refresh INTEGER NOT NULL DEFAULT 0
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS organisations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            is_internal INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS badges (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            label TEXT NOT NULL,
            color TEXT NOT NULL DEFAULT 'blue'
        );

        CREATE TABLE IF NOT EXISTS documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            original_name TEXT NOT NULL,
            category TEXT NOT NULL DEFAULT 'Project',
            path TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'Open',
            priority TEXT NOT NULL DEFAULT 'High',
            author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            client_id INTEGER NOT NULL REFERENCES organisations(id) ON DELETE CASCADE,
            date_created TEXT NOT NULL,
            date_updated TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS bugs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'Open',
            priority TEXT NOT NULL DEFAULT 'High',
            owner_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            date_created TEXT NOT NULL,
            date_updated TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content TEXT NOT NULL,
            author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            project_id INTEGER REFERENCES projects(id) ON DELETE CASCADE,
            bug_id INTEGER REFERENCES bugs(id) ON DELETE CASCADE,
            date_created TEXT NOT NULL,
            date_updated TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS threads (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content TEXT NOT NULL,
            author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            project_id INTEGER REFERENCES projects(id) ON DELETE CASCADE,
            bug_id INTEGER REFERENCES bugs(id) ON DELETE CASCADE,
            date_created TEXT NOT NULL,
            date_updated TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS thread_replies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content TEXT NOT NULL,
            author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            thread_id INTEGER NOT NULL REFERENCES threads(id) ON DELETE CASCADE,
            project_id INTEGER REFERENCES projects(id) ON DELETE CASCADE,
            bug_id INTEGER REFERENCES bugs(id) ON DELETE CASCADE,
            date_created TEXT NOT NULL,
            date_updated TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Many-to-many join tables
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS project_badges (
            project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            badge_id INTEGER NOT NULL REFERENCES badges(id) ON DELETE CASCADE,
            PRIMARY KEY (project_id, badge_id)
        );

        CREATE TABLE IF NOT EXISTS project_documents (
            project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
            PRIMARY KEY (project_id, document_id)
        );

        CREATE TABLE IF NOT EXISTS bug_badges (
            bug_id INTEGER NOT NULL REFERENCES bugs(id) ON DELETE CASCADE,
            badge_id INTEGER NOT NULL REFERENCES badges(id) ON DELETE CASCADE,
            PRIMARY KEY (bug_id, badge_id)
        );

        CREATE TABLE IF NOT EXISTS bug_documents (
            bug_id INTEGER NOT NULL REFERENCES bugs(id) ON DELETE CASCADE,
            document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
            PRIMARY KEY (bug_id, document_id)
        );

        CREATE TABLE IF NOT EXISTS bug_allocated_to (
            bug_id INTEGER NOT NULL REFERENCES bugs(id) ON DELETE CASCADE,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            PRIMARY KEY (bug_id, user_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Append-only change history; no foreign key so it outlives its object
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS object_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            object_class TEXT NOT NULL,
            object_id INTEGER NOT NULL,
            attribute_name TEXT NOT NULL,
            attribute_type TEXT NOT NULL,
            attribute_prior_state TEXT NOT NULL,
            attribute_new_state TEXT NOT NULL,
            date_created TEXT NOT NULL,
            date_updated TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_tokens_token ON tokens(token);
        CREATE INDEX IF NOT EXISTS idx_projects_client ON projects(client_id);
        CREATE INDEX IF NOT EXISTS idx_bugs_project ON bugs(project_id);
        CREATE INDEX IF NOT EXISTS idx_comments_bug ON comments(bug_id);
        CREATE INDEX IF NOT EXISTS idx_comments_project ON comments(project_id);
        CREATE INDEX IF NOT EXISTS idx_threads_bug ON threads(bug_id);
        CREATE INDEX IF NOT EXISTS idx_thread_replies_thread ON thread_replies(thread_id);
        CREATE INDEX IF NOT EXISTS idx_object_history_object ON object_history(object_class, object_id);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
