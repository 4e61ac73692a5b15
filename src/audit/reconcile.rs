//! Many-to-many association reconciliation.

use std::collections::BTreeSet;

use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};

use super::{timestamp, Target};
use crate::errors::AppError;
use crate::models::AuditRecord;

const ATTRIBUTE_TYPE: &str = "ManyToManyRelation";

/// A join table linking an owner entity to members of a target table.
#[derive(Debug, PartialEq, Eq)]
pub struct Association {
    /// Attribute name written to the audit trail
    pub name: &'static str,
    pub join_table: &'static str,
    pub owner_column: &'static str,
    pub member_column: &'static str,
    pub target: &'static Target,
    /// Prior state rendered when the association was empty
    pub empty_label: &'static str,
    /// New state rendered when the association is cleared
    pub cleared_label: &'static str,
}

impl Association {
    /// Current members as `(id, label)` pairs, ordered by id.
    pub async fn members(
        &self,
        conn: &mut SqliteConnection,
        owner_id: i64,
    ) -> Result<Vec<(i64, String)>, AppError> {
        let sql = format!(
            "SELECT t.id AS id, t.{label} AS label FROM {join} j \
             JOIN {table} t ON t.id = j.{member} \
             WHERE j.{owner} = ? ORDER BY t.id",
            label = self.target.label_column,
            join = self.join_table,
            table = self.target.table,
            member = self.member_column,
            owner = self.owner_column,
        );
        let rows = sqlx::query(&sql)
            .bind(owner_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(rows
            .iter()
            .map(|r| (r.get("id"), r.get("label")))
            .collect())
    }

    async fn clear(&self, conn: &mut SqliteConnection, owner_id: i64) -> Result<(), AppError> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            self.join_table, self.owner_column
        );
        sqlx::query(&sql).bind(owner_id).execute(&mut *conn).await?;
        Ok(())
    }

    async fn add(
        &self,
        conn: &mut SqliteConnection,
        owner_id: i64,
        member_ids: &[i64],
    ) -> Result<(), AppError> {
        if member_ids.is_empty() {
            return Ok(());
        }
        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "INSERT OR IGNORE INTO {} ({}, {}) ",
            self.join_table, self.owner_column, self.member_column
        ));
        query.push_values(member_ids, |mut row, member_id| {
            row.push_bind(owner_id).push_bind(*member_id);
        });
        query.build().execute(&mut *conn).await?;
        Ok(())
    }
}

/// What one reconciliation changed.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    /// Present only when membership changed
    pub record: Option<AuditRecord>,
    pub added: Vec<i64>,
    pub removed: Vec<i64>,
    /// Proposed ids with no matching row
    pub dropped: Vec<i64>,
}

/// Bring the association of `owner_id` in line with `proposed`.
///
/// `None` and an empty slice both clear the association. Otherwise the
/// association is cleared and the proposed members that exist are added back,
/// unless they already equal the current members, in which case nothing is
/// written. At most one audit record is produced; it is returned, not stored.
pub async fn reconcile(
    conn: &mut SqliteConnection,
    owner_class: &str,
    owner_id: i64,
    association: &Association,
    proposed: Option<&[i64]>,
) -> Result<ReconcileOutcome, AppError> {
    let current = association.members(conn, owner_id).await?;
    let proposed = proposed.unwrap_or(&[]);

    let resolved = association.target.resolve(conn, proposed).await?;
    let resolved_ids: BTreeSet<i64> = resolved.iter().map(|(id, _)| *id).collect();
    let current_ids: BTreeSet<i64> = current.iter().map(|(id, _)| *id).collect();

    let dropped: Vec<i64> = proposed
        .iter()
        .copied()
        .filter(|id| !resolved_ids.contains(id))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if !dropped.is_empty() {
        tracing::warn!(
            "Ignoring unknown {} ids {:?} for {} {} {}",
            association.target.class,
            dropped,
            owner_class,
            owner_id,
            association.name
        );
    }

    if resolved_ids == current_ids {
        return Ok(ReconcileOutcome {
            dropped,
            ..Default::default()
        });
    }

    let prior = if current.is_empty() {
        association.empty_label.to_string()
    } else {
        join_labels(&current)
    };
    let new = if resolved.is_empty() {
        association.cleared_label.to_string()
    } else {
        join_labels(&resolved)
    };

    association.clear(conn, owner_id).await?;
    let member_ids: Vec<i64> = resolved_ids.iter().copied().collect();
    association.add(conn, owner_id, &member_ids).await?;

    let added: Vec<i64> = resolved_ids.difference(&current_ids).copied().collect();
    let removed: Vec<i64> = current_ids.difference(&resolved_ids).copied().collect();
    tracing::debug!(
        "{} {} {}: added {:?}, removed {:?}",
        owner_class,
        owner_id,
        association.name,
        added,
        removed
    );

    Ok(ReconcileOutcome {
        record: Some(AuditRecord {
            object_class: owner_class.to_string(),
            object_id: owner_id,
            attribute_name: association.name.to_string(),
            attribute_type: ATTRIBUTE_TYPE.to_string(),
            attribute_prior_state: prior,
            attribute_new_state: new,
            created_at: timestamp(),
        }),
        added,
        removed,
        dropped,
    })
}

fn join_labels(members: &[(i64, String)]) -> String {
    members
        .iter()
        .map(|(_, label)| label.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
