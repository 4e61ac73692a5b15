//! Comments, threads and thread replies.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use super::{fetch_bug, fetch_project, Repository};
use crate::audit::{timestamp, Audited};
use crate::errors::AppError;
use crate::models::{
    Bug, CommentRequest, CommentView, Project, ThreadReplyRequest, ThreadReplyView, User,
};

/// A table holding comment-shaped posts.
pub(super) struct PostTable {
    pub table: &'static str,
    pub kind: &'static str,
}

pub(super) static COMMENTS: PostTable = PostTable {
    table: "comments",
    kind: "Comment",
};

pub(super) static THREADS: PostTable = PostTable {
    table: "threads",
    kind: "Thread",
};

impl Repository {
    /// Comments on a bug.
    pub async fn list_bug_comments(&self, bug_id: i64) -> Result<Vec<CommentView>, AppError> {
        let mut conn = self.pool.acquire().await?;
        posts_for(&mut conn, &COMMENTS, "bug_id", bug_id).await
    }

    /// Threads on a bug.
    pub async fn list_bug_threads(&self, bug_id: i64) -> Result<Vec<CommentView>, AppError> {
        let mut conn = self.pool.acquire().await?;
        posts_for(&mut conn, &THREADS, "bug_id", bug_id).await
    }

    /// Add a comment to a bug or, failing that, a project.
    pub async fn create_comment(
        &self,
        request: &CommentRequest,
        author: &User,
    ) -> Result<CommentView, AppError> {
        self.create_post(&COMMENTS, request, author).await
    }

    /// Open a thread on a bug or, failing that, a project.
    pub async fn create_thread(
        &self,
        request: &CommentRequest,
        author: &User,
    ) -> Result<CommentView, AppError> {
        self.create_post(&THREADS, request, author).await
    }

    async fn create_post(
        &self,
        posts: &PostTable,
        request: &CommentRequest,
        author: &User,
    ) -> Result<CommentView, AppError> {
        let mut conn = self.pool.acquire().await?;

        let (column, owner_id) = match (request.bug_id, request.project_id) {
            (Some(bug_id), _) => {
                fetch_bug(&mut conn, bug_id)
                    .await?
                    .ok_or_else(|| AppError::not_found(Bug::CLASS, bug_id))?;
                ("bug_id", bug_id)
            }
            (None, Some(project_id)) => {
                fetch_project(&mut conn, project_id)
                    .await?
                    .ok_or_else(|| AppError::not_found(Project::CLASS, project_id))?;
                ("project_id", project_id)
            }
            (None, None) => {
                return Err(AppError::Validation(
                    "Either bugId or projectId is required".to_string(),
                ))
            }
        };

        let now = timestamp();
        let sql = format!(
            "INSERT INTO {} (content, author_id, {}, date_created, date_updated) VALUES (?, ?, ?, ?, ?)",
            posts.table, column
        );
        let result = sqlx::query(&sql)
            .bind(&request.content)
            .bind(author.id)
            .bind(owner_id)
            .bind(&now)
            .bind(&now)
            .execute(&mut *conn)
            .await?;

        tracing::debug!("{} added to {} {}", posts.kind, column, owner_id);
        Ok(CommentView {
            id: result.last_insert_rowid(),
            content: request.content.clone(),
            author: author.clone(),
            date_created: now.clone(),
            date_updated: now,
        })
    }

    /// Replies in a thread, oldest first.
    pub async fn list_thread_replies(&self, thread_id: i64) -> Result<Vec<ThreadReplyView>, AppError> {
        let rows = sqlx::query(
            "SELECT r.id, r.thread_id, r.content, r.date_created, r.date_updated, \
                    u.id AS author_id, u.username AS author_username \
             FROM thread_replies r JOIN users u ON u.id = r.author_id \
             WHERE r.thread_id = ? ORDER BY r.id",
        )
        .bind(thread_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(reply_from_row).collect())
    }

    /// Reply to a thread and return all of its replies. The reply inherits
    /// the thread's bug or project.
    pub async fn create_thread_reply(
        &self,
        request: &ThreadReplyRequest,
        author: &User,
    ) -> Result<Vec<ThreadReplyView>, AppError> {
        let thread = sqlx::query("SELECT id, project_id, bug_id FROM threads WHERE id = ?")
            .bind(request.thread_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Thread", request.thread_id))?;
        let project_id: Option<i64> = thread.get("project_id");
        let bug_id: Option<i64> = thread.get("bug_id");

        let now = timestamp();
        sqlx::query(
            "INSERT INTO thread_replies (content, author_id, thread_id, project_id, bug_id, date_created, date_updated) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&request.content)
        .bind(author.id)
        .bind(request.thread_id)
        .bind(project_id)
        .bind(bug_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.list_thread_replies(request.thread_id).await
    }
}

/// Posts of `posts` whose `column` equals `owner_id`, oldest first.
pub(super) async fn posts_for(
    conn: &mut SqliteConnection,
    posts: &PostTable,
    column: &str,
    owner_id: i64,
) -> Result<Vec<CommentView>, AppError> {
    let sql = format!(
        "SELECT p.id, p.content, p.date_created, p.date_updated, \
                u.id AS author_id, u.username AS author_username \
         FROM {} p JOIN users u ON u.id = p.author_id \
         WHERE p.{} = ? ORDER BY p.id",
        posts.table, column
    );
    let rows = sqlx::query(&sql)
        .bind(owner_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows.iter().map(post_from_row).collect())
}

fn author_from_row(row: &SqliteRow) -> User {
    User {
        id: row.get("author_id"),
        username: row.get("author_username"),
    }
}

fn post_from_row(row: &SqliteRow) -> CommentView {
    CommentView {
        id: row.get("id"),
        content: row.get("content"),
        author: author_from_row(row),
        date_created: row.get("date_created"),
        date_updated: row.get("date_updated"),
    }
}

fn reply_from_row(row: &SqliteRow) -> ThreadReplyView {
    ThreadReplyView {
        id: row.get("id"),
        thread_id: row.get("thread_id"),
        content: row.get("content"),
        author: author_from_row(row),
        date_created: row.get("date_created"),
        date_updated: row.get("date_updated"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::test_support::{seed_bug, seed_project};
    use crate::db::init_database;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, Repository, User, i64, i64) {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("test.sqlite")).await.unwrap();
        let repo = Repository::new(pool);
        let mut conn = repo.pool.acquire().await.unwrap();
        let fx = seed_project(&mut conn).await;
        let bug = seed_bug(&mut conn, fx.project_id, fx.user_id, "A").await;
        drop(conn);
        let author = repo.get_user(fx.user_id).await.unwrap().unwrap();
        (dir, repo, author, fx.project_id, bug.id)
    }

    #[tokio::test]
    async fn test_bug_takes_precedence() {
        let (_dir, repo, author, project_id, bug_id) = setup().await;
        let request = CommentRequest {
            content: "Seen on staging".into(),
            project_id: Some(project_id),
            bug_id: Some(bug_id),
        };
        let comment = repo.create_comment(&request, &author).await.unwrap();
        assert_eq!(comment.author, author);

        let on_bug = repo.list_bug_comments(bug_id).await.unwrap();
        assert_eq!(on_bug.len(), 1);
        assert_eq!(on_bug[0].content, "Seen on staging");
        assert!(repo.get_project(project_id).await.unwrap().comments.is_empty());
    }

    #[tokio::test]
    async fn test_post_needs_a_target() {
        let (_dir, repo, author, _, _) = setup().await;
        let request = CommentRequest {
            content: "Orphan".into(),
            project_id: None,
            bug_id: None,
        };
        let err = repo.create_thread(&request, &author).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_thread_replies() {
        let (_dir, repo, author, _, bug_id) = setup().await;
        let thread = repo
            .create_thread(
                &CommentRequest {
                    content: "Root cause?".into(),
                    project_id: None,
                    bug_id: Some(bug_id),
                },
                &author,
            )
            .await
            .unwrap();
        assert_eq!(repo.list_bug_threads(bug_id).await.unwrap().len(), 1);

        let replies = repo
            .create_thread_reply(
                &ThreadReplyRequest {
                    thread_id: thread.id,
                    content: "Race in the cache".into(),
                },
                &author,
            )
            .await
            .unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].thread_id, thread.id);

        let err = repo
            .create_thread_reply(
                &ThreadReplyRequest {
                    thread_id: thread.id + 1,
                    content: "lost".into(),
                },
                &author,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
