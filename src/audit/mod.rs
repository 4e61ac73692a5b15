//! Audit-trailed mutation engine.
//!
//! Updates to projects, bugs and organisations go through [`audited_update`]:
//! scalar fields are diffed against the persisted row and only the changed
//! columns are written, many-to-many associations are reconciled against the
//! proposed id sets, and one [`AuditRecord`] per changed attribute is appended
//! to `object_history`. Callers run the whole sequence on a single
//! transaction so the entity and its history commit or roll back together.

mod engine;
mod fields;
mod reconcile;

#[cfg(test)]
pub(crate) mod test_support;

pub use engine::*;
pub use fields::*;
pub use reconcile::*;

use chrono::Utc;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};

use crate::errors::AppError;
use crate::models::AuditRecord;

/// A table whose rows can be referenced by a foreign key or an association,
/// together with the column used to render a row in audit text.
#[derive(Debug, PartialEq, Eq)]
pub struct Target {
    pub class: &'static str,
    pub table: &'static str,
    pub label_column: &'static str,
}

pub static ORGANISATIONS: Target = Target {
    class: "Organisation",
    table: "organisations",
    label_column: "name",
};

pub static USERS: Target = Target {
    class: "User",
    table: "users",
    label_column: "username",
};

pub static BADGES: Target = Target {
    class: "Badge",
    table: "badges",
    label_column: "label",
};

pub static DOCUMENTS: Target = Target {
    class: "Document",
    table: "documents",
    label_column: "original_name",
};

impl Target {
    /// Display label of one row, or `None` if it does not exist.
    pub async fn label(
        &self,
        conn: &mut SqliteConnection,
        id: i64,
    ) -> Result<Option<String>, AppError> {
        let sql = format!(
            "SELECT {} AS label FROM {} WHERE id = ?",
            self.label_column, self.table
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row.map(|r| r.get("label")))
    }

    /// Existing rows among `ids` as `(id, label)` pairs, ordered by id.
    /// Ids without a row are silently absent from the result.
    pub async fn resolve(
        &self,
        conn: &mut SqliteConnection,
        ids: &[i64],
    ) -> Result<Vec<(i64, String)>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT id, {} AS label FROM {} WHERE id IN (",
            self.label_column, self.table
        ));
        let mut list = query.separated(", ");
        for id in ids {
            list.push_bind(*id);
        }
        list.push_unseparated(") ORDER BY id");

        let rows = query.build().fetch_all(&mut *conn).await?;
        Ok(rows
            .iter()
            .map(|r| (r.get("id"), r.get("label")))
            .collect())
    }
}

/// Current time in the format every timestamp column uses.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339()
}

/// Insert all records of one operation as a single multi-row statement.
pub async fn record_history(
    conn: &mut SqliteConnection,
    records: &[AuditRecord],
) -> Result<(), AppError> {
    if records.is_empty() {
        return Ok(());
    }

    let mut query = QueryBuilder::<Sqlite>::new(
        "INSERT INTO object_history (object_class, object_id, attribute_name, attribute_type, \
         attribute_prior_state, attribute_new_state, date_created, date_updated) ",
    );
    query.push_values(records, |mut row, record| {
        row.push_bind(record.object_class.clone())
            .push_bind(record.object_id)
            .push_bind(record.attribute_name.clone())
            .push_bind(record.attribute_type.clone())
            .push_bind(record.attribute_prior_state.clone())
            .push_bind(record.attribute_new_state.clone())
            .push_bind(record.created_at.clone())
            .push_bind(record.created_at.clone());
    });
    query.build().execute(&mut *conn).await?;

    tracing::debug!("Recorded {} history entries", records.len());
    Ok(())
}
