//! Scalar diffing and partial persistence.

use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use super::{record_history, reconcile, timestamp, Association, Target};
use crate::errors::AppError;
use crate::models::AuditRecord;

/// Comparable, renderable value of one scalar attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Flag(bool),
    /// Enum stored and rendered by its value
    Choice(&'static str),
    /// Foreign key, rendered as the referenced row's label
    Reference(&'static Target, i64),
}

impl FieldValue {
    /// Human-readable form used in audit records.
    pub async fn render(&self, conn: &mut SqliteConnection) -> Result<String, AppError> {
        match self {
            FieldValue::Text(text) => Ok(text.clone()),
            FieldValue::Flag(flag) => Ok(flag.to_string()),
            FieldValue::Choice(value) => Ok(value.to_string()),
            FieldValue::Reference(target, id) => target
                .label(conn, *id)
                .await?
                .ok_or_else(|| AppError::not_found(target.class, *id)),
        }
    }
}

/// One row of an entity's field table.
pub struct FieldSpec<E, U> {
    /// Attribute name written to the audit trail
    pub name: &'static str,
    /// Column written on change
    pub column: &'static str,
    pub attribute_type: &'static str,
    pub current: fn(&E) -> FieldValue,
    pub proposed: fn(&U) -> FieldValue,
    /// Copy the proposed value onto the entity
    pub apply: fn(&mut E, &U),
}

/// An entity whose updates are diffed and audited.
pub trait Audited: Sized {
    /// Proposed-state payload
    type Update;

    const CLASS: &'static str;
    const TABLE: &'static str;
    /// Column stamped with the update time whenever anything changes
    const UPDATED_COLUMN: Option<&'static str> = None;

    fn id(&self) -> i64;

    fn fields() -> Vec<FieldSpec<Self, Self::Update>>;

    /// Associations the payload proposes a target set for.
    fn associations(_update: &Self::Update) -> Vec<(&'static Association, Option<&[i64]>)> {
        Vec::new()
    }

    fn touch(&mut self, _at: &str) {}
}

/// Result of diffing and persisting the scalar fields of one entity.
#[derive(Debug)]
pub struct UpdateOutcome<E> {
    pub entity: E,
    pub records: Vec<AuditRecord>,
    /// Columns written by the partial update
    pub changed_fields: Vec<&'static str>,
}

/// Result of a complete audited update.
#[derive(Debug)]
pub struct AuditedUpdate<E> {
    pub entity: E,
    /// Every record written, scalar ones first
    pub records: Vec<AuditRecord>,
    pub changed_fields: Vec<&'static str>,
    /// Proposed association ids that did not resolve and were ignored
    pub dropped_ids: Vec<i64>,
}

/// Diff `update` against `entity`, apply and persist only the changed fields,
/// and return one audit record per change. Records are not written here.
pub async fn apply_update<E: Audited>(
    conn: &mut SqliteConnection,
    mut entity: E,
    update: &E::Update,
) -> Result<UpdateOutcome<E>, AppError> {
    let created_at = timestamp();
    let mut records = Vec::new();
    let mut changed_fields = Vec::new();
    let mut assignments = Vec::new();

    for field in E::fields() {
        let current = (field.current)(&entity);
        let proposed = (field.proposed)(update);
        if current == proposed {
            continue;
        }

        // Render the prior value before the entity is touched
        let prior = current.render(conn).await?;
        let new = proposed.render(conn).await?;

        records.push(AuditRecord {
            object_class: E::CLASS.to_string(),
            object_id: entity.id(),
            attribute_name: field.name.to_string(),
            attribute_type: field.attribute_type.to_string(),
            attribute_prior_state: prior,
            attribute_new_state: new,
            created_at: created_at.clone(),
        });

        (field.apply)(&mut entity, update);
        changed_fields.push(field.column);
        assignments.push((field.column, proposed));
    }

    if !assignments.is_empty() {
        if let Some(column) = E::UPDATED_COLUMN {
            entity.touch(&created_at);
            assignments.push((column, FieldValue::Text(created_at.clone())));
        }
        persist_fields(conn, E::TABLE, entity.id(), assignments).await?;
        tracing::debug!(
            "{} {} changed fields: {:?}",
            E::CLASS,
            entity.id(),
            changed_fields
        );
    }

    Ok(UpdateOutcome {
        entity,
        records,
        changed_fields,
    })
}

/// Scalar diff, association reconciliation and the history batch for one
/// entity. Run it on a transaction: nothing here commits.
pub async fn audited_update<E: Audited>(
    conn: &mut SqliteConnection,
    entity: E,
    update: &E::Update,
) -> Result<AuditedUpdate<E>, AppError> {
    let outcome = apply_update(conn, entity, update).await?;
    let owner_id = outcome.entity.id();

    let mut records = outcome.records;
    let mut dropped_ids = Vec::new();
    for (association, proposed) in E::associations(update) {
        let reconciled = reconcile(conn, E::CLASS, owner_id, association, proposed).await?;
        records.extend(reconciled.record);
        dropped_ids.extend(reconciled.dropped);
    }

    record_history(conn, &records).await?;

    Ok(AuditedUpdate {
        entity: outcome.entity,
        records,
        changed_fields: outcome.changed_fields,
        dropped_ids,
    })
}

/// `UPDATE <table> SET <only the given columns> WHERE id = ?`
async fn persist_fields(
    conn: &mut SqliteConnection,
    table: &str,
    id: i64,
    assignments: Vec<(&'static str, FieldValue)>,
) -> Result<(), AppError> {
    let mut query = QueryBuilder::<Sqlite>::new(format!("UPDATE {} SET ", table));
    {
        let mut set = query.separated(", ");
        for (column, value) in assignments {
            set.push(format!("{} = ", column));
            match value {
                FieldValue::Text(text) => set.push_bind_unseparated(text),
                FieldValue::Flag(flag) => set.push_bind_unseparated(flag),
                FieldValue::Choice(choice) => set.push_bind_unseparated(choice),
                FieldValue::Reference(_, id) => set.push_bind_unseparated(id),
            };
        }
    }
    query.push(" WHERE id = ").push_bind(id);

    let result = query.build().execute(&mut *conn).await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("{} row {} vanished", table, id)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::models::{Bug, BugRequest, Organisation, OrganisationRequest, Priority, Status};

    fn bug_request(bug: &Bug, content: &str, status: Status) -> BugRequest {
        BugRequest {
            id: Some(bug.id),
            content: content.to_string(),
            status,
            priority: bug.priority,
            project_id: bug.project_id,
            allocated_to_ids: None,
            badge_ids: None,
        }
    }

    #[tokio::test]
    async fn test_single_changed_field_is_audited() {
        let (_dir, pool) = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let fx = seed_project(&mut conn).await;
        let bug = seed_bug(&mut conn, fx.project_id, fx.user_id, "A").await;

        let request = bug_request(&bug, "B", Status::Open);
        let outcome = apply_update(&mut conn, bug.clone(), &request).await.unwrap();

        assert_eq!(outcome.changed_fields, vec!["content"]);
        assert_eq!(outcome.records.len(), 1);
        let record = &outcome.records[0];
        assert_eq!(record.object_class, "Bug");
        assert_eq!(record.object_id, bug.id);
        assert_eq!(record.attribute_name, "content");
        assert_eq!(record.attribute_prior_state, "A");
        assert_eq!(record.attribute_new_state, "B");
        assert_eq!(outcome.entity.content, "B");

        let stored = load_bug(&mut conn, bug.id).await;
        assert_eq!(stored.content, "B");
        assert_eq!(stored.status, Status::Open);
        // Records are only staged by apply_update
        assert_eq!(history_count(&mut conn).await, 0);
    }

    #[tokio::test]
    async fn test_enum_changes_render_by_value() {
        let (_dir, pool) = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let fx = seed_project(&mut conn).await;
        let bug = seed_bug(&mut conn, fx.project_id, fx.user_id, "A").await;

        let mut request = bug_request(&bug, "A", Status::Closed);
        request.priority = Priority::Low;
        let outcome = apply_update(&mut conn, bug, &request).await.unwrap();

        assert_eq!(outcome.changed_fields, vec!["status", "priority"]);
        assert_eq!(outcome.records.len(), outcome.changed_fields.len());
        assert_eq!(outcome.records[0].attribute_prior_state, "Open");
        assert_eq!(outcome.records[0].attribute_new_state, "Closed");
        assert_eq!(outcome.records[1].attribute_type, "Priority");
        assert_eq!(outcome.records[1].attribute_new_state, "Low");
    }

    #[tokio::test]
    async fn test_no_changes_is_a_noop() {
        let (_dir, pool) = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let fx = seed_project(&mut conn).await;
        let bug = seed_bug(&mut conn, fx.project_id, fx.user_id, "A").await;

        let request = bug_request(&bug, "A", Status::Open);
        let outcome = apply_update(&mut conn, bug.clone(), &request).await.unwrap();

        assert!(outcome.records.is_empty());
        assert!(outcome.changed_fields.is_empty());
        // date_updated untouched means no write happened
        assert_eq!(load_bug(&mut conn, bug.id).await, bug);
    }

    #[tokio::test]
    async fn test_second_identical_update_records_nothing() {
        let (_dir, pool) = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let fx = seed_project(&mut conn).await;
        let bug = seed_bug(&mut conn, fx.project_id, fx.user_id, "A").await;
        let request = bug_request(&bug, "B", Status::Closed);

        let first = audited_update(&mut conn, bug.clone(), &request).await.unwrap();
        assert_eq!(first.records.len(), 2);

        let reloaded = load_bug(&mut conn, bug.id).await;
        let second = audited_update(&mut conn, reloaded, &request).await.unwrap();
        assert!(second.records.is_empty());
        assert_eq!(history_count(&mut conn).await, 2);
    }

    #[tokio::test]
    async fn test_foreign_key_renders_organisation_names() {
        let (_dir, pool) = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let fx = seed_project(&mut conn).await;
        let other = seed_organisation(&mut conn, "Globex").await;
        let project = load_project(&mut conn, fx.project_id).await;

        let request = crate::models::ProjectRequest {
            id: Some(project.id),
            name: project.name.clone(),
            status: project.status,
            priority: project.priority,
            client_id: other,
            badge_ids: None,
        };
        let outcome = apply_update(&mut conn, project, &request).await.unwrap();

        assert_eq!(outcome.changed_fields, vec!["client_id"]);
        let record = &outcome.records[0];
        assert_eq!(record.attribute_name, "client");
        assert_eq!(record.attribute_type, "Organisation");
        assert_eq!(record.attribute_prior_state, "Acme");
        assert_eq!(record.attribute_new_state, "Globex");
        assert_eq!(load_project(&mut conn, fx.project_id).await.client_id, other);
    }

    #[tokio::test]
    async fn test_unknown_foreign_key_fails_before_writing() {
        let (_dir, pool) = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let fx = seed_project(&mut conn).await;
        let project = load_project(&mut conn, fx.project_id).await;

        let request = crate::models::ProjectRequest {
            id: Some(project.id),
            name: "Renamed".into(),
            status: project.status,
            priority: project.priority,
            client_id: 999_999,
            badge_ids: None,
        };
        let err = apply_update(&mut conn, project, &request).await.unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(load_project(&mut conn, fx.project_id).await.name, "Apollo");
    }

    #[tokio::test]
    async fn test_organisation_flag_change() {
        let (_dir, pool) = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let id = seed_organisation(&mut conn, "Initech").await;
        let org = Organisation {
            id,
            name: "Initech".into(),
            is_internal: false,
        };

        let request = OrganisationRequest {
            id: Some(id),
            name: "Initech".into(),
            is_internal: true,
        };
        let outcome = audited_update(&mut conn, org, &request).await.unwrap();

        assert_eq!(outcome.changed_fields, vec!["is_internal"]);
        assert_eq!(outcome.records[0].attribute_prior_state, "false");
        assert_eq!(outcome.records[0].attribute_new_state, "true");
        assert!(outcome.entity.is_internal);
        assert_eq!(history_count(&mut conn).await, 1);
    }

    #[tokio::test]
    async fn test_failed_history_insert_rolls_back_entity() {
        let (_dir, pool) = test_pool().await;
        let fx = {
            let mut conn = pool.acquire().await.unwrap();
            seed_project(&mut conn).await
        };
        let bug = {
            let mut conn = pool.acquire().await.unwrap();
            seed_bug(&mut conn, fx.project_id, fx.user_id, "A").await
        };

        let mut tx = pool.begin().await.unwrap();
        sqlx::query("DROP TABLE object_history")
            .execute(&mut *tx)
            .await
            .unwrap();
        let request = bug_request(&bug, "B", Status::Open);
        let result = audited_update(&mut *tx, bug.clone(), &request).await;
        assert!(result.is_err());
        tx.rollback().await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(load_bug(&mut conn, bug.id).await.content, "A");
        assert_eq!(history_count(&mut conn).await, 0);
    }
}
