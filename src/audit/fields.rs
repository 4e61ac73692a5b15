//! Field tables and associations of the audited entities.

use super::{Association, Audited, FieldSpec, FieldValue, BADGES, DOCUMENTS, ORGANISATIONS, USERS};
use crate::models::{Bug, BugRequest, Organisation, OrganisationRequest, Project, ProjectRequest};

type ProjectField = FieldSpec<Project, ProjectRequest>;
type BugField = FieldSpec<Bug, BugRequest>;
type OrganisationField = FieldSpec<Organisation, OrganisationRequest>;

pub static PROJECT_BADGES: Association = Association {
    name: "badges",
    join_table: "project_badges",
    owner_column: "project_id",
    member_column: "badge_id",
    target: &BADGES,
    empty_label: "No badges",
    cleared_label: "no badges",
};

pub static PROJECT_DOCUMENTS: Association = Association {
    name: "documents",
    join_table: "project_documents",
    owner_column: "project_id",
    member_column: "document_id",
    target: &DOCUMENTS,
    empty_label: "No documents",
    cleared_label: "no documents",
};

pub static BUG_BADGES: Association = Association {
    name: "badges",
    join_table: "bug_badges",
    owner_column: "bug_id",
    member_column: "badge_id",
    target: &BADGES,
    empty_label: "No badges",
    cleared_label: "no badges",
};

pub static BUG_DOCUMENTS: Association = Association {
    name: "documents",
    join_table: "bug_documents",
    owner_column: "bug_id",
    member_column: "document_id",
    target: &DOCUMENTS,
    empty_label: "No documents",
    cleared_label: "no documents",
};

pub static BUG_ALLOCATED_TO: Association = Association {
    name: "allocated_to",
    join_table: "bug_allocated_to",
    owner_column: "bug_id",
    member_column: "user_id",
    target: &USERS,
    empty_label: "Nobody",
    cleared_label: "nobody",
};

impl Audited for Project {
    type Update = ProjectRequest;

    const CLASS: &'static str = "Project";
    const TABLE: &'static str = "projects";
    const UPDATED_COLUMN: Option<&'static str> = Some("date_updated");

    fn id(&self) -> i64 {
        self.id
    }

    fn fields() -> Vec<FieldSpec<Self, Self::Update>> {
        vec![
            ProjectField {
                name: "name",
                column: "name",
                attribute_type: "String",
                current: |p| FieldValue::Text(p.name.clone()),
                proposed: |u| FieldValue::Text(u.name.clone()),
                apply: |p, u| p.name = u.name.clone(),
            },
            ProjectField {
                name: "status",
                column: "status",
                attribute_type: "Status",
                current: |p| FieldValue::Choice(p.status.as_str()),
                proposed: |u| FieldValue::Choice(u.status.as_str()),
                apply: |p, u| p.status = u.status,
            },
            ProjectField {
                name: "priority",
                column: "priority",
                attribute_type: "Priority",
                current: |p| FieldValue::Choice(p.priority.as_str()),
                proposed: |u| FieldValue::Choice(u.priority.as_str()),
                apply: |p, u| p.priority = u.priority,
            },
            ProjectField {
                name: "client",
                column: "client_id",
                attribute_type: "Organisation",
                current: |p| FieldValue::Reference(&ORGANISATIONS, p.client_id),
                proposed: |u| FieldValue::Reference(&ORGANISATIONS, u.client_id),
                apply: |p, u| p.client_id = u.client_id,
            },
        ]
    }

    fn associations(update: &ProjectRequest) -> Vec<(&'static Association, Option<&[i64]>)> {
        vec![(&PROJECT_BADGES, update.badge_ids.as_deref())]
    }

    fn touch(&mut self, at: &str) {
        self.date_updated = at.to_string();
    }
}

impl Audited for Bug {
    type Update = BugRequest;

    const CLASS: &'static str = "Bug";
    const TABLE: &'static str = "bugs";
    const UPDATED_COLUMN: Option<&'static str> = Some("date_updated");

    fn id(&self) -> i64 {
        self.id
    }

    fn fields() -> Vec<FieldSpec<Self, Self::Update>> {
        vec![
            BugField {
                name: "content",
                column: "content",
                attribute_type: "String",
                current: |b| FieldValue::Text(b.content.clone()),
                proposed: |u| FieldValue::Text(u.content.clone()),
                apply: |b, u| b.content = u.content.clone(),
            },
            BugField {
                name: "status",
                column: "status",
                attribute_type: "Status",
                current: |b| FieldValue::Choice(b.status.as_str()),
                proposed: |u| FieldValue::Choice(u.status.as_str()),
                apply: |b, u| b.status = u.status,
            },
            BugField {
                name: "priority",
                column: "priority",
                attribute_type: "Priority",
                current: |b| FieldValue::Choice(b.priority.as_str()),
                proposed: |u| FieldValue::Choice(u.priority.as_str()),
                apply: |b, u| b.priority = u.priority,
            },
        ]
    }

    fn associations(update: &BugRequest) -> Vec<(&'static Association, Option<&[i64]>)> {
        vec![
            (&BUG_ALLOCATED_TO, update.allocated_to_ids.as_deref()),
            (&BUG_BADGES, update.badge_ids.as_deref()),
        ]
    }

    fn touch(&mut self, at: &str) {
        self.date_updated = at.to_string();
    }
}

impl Audited for Organisation {
    type Update = OrganisationRequest;

    const CLASS: &'static str = "Organisation";
    const TABLE: &'static str = "organisations";

    fn id(&self) -> i64 {
        self.id
    }

    fn fields() -> Vec<FieldSpec<Self, Self::Update>> {
        vec![
            OrganisationField {
                name: "name",
                column: "name",
                attribute_type: "String",
                current: |o| FieldValue::Text(o.name.clone()),
                proposed: |u| FieldValue::Text(u.name.clone()),
                apply: |o, u| o.name = u.name.clone(),
            },
            OrganisationField {
                name: "is_internal",
                column: "is_internal",
                attribute_type: "bool",
                current: |o| FieldValue::Flag(o.is_internal),
                proposed: |u| FieldValue::Flag(u.is_internal),
                apply: |o, u| o.is_internal = u.is_internal,
            },
        ]
    }
}
