//! Change history (audit trail) models.

use serde::{Deserialize, Serialize};

/// One immutable change-history row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub object_class: String,
    pub object_id: i64,
    pub attribute_name: String,
    pub attribute_type: String,
    pub attribute_prior_state: String,
    pub attribute_new_state: String,
    pub created_at: String,
}

impl AuditRecord {
    /// Sentence describing the change, e.g.
    /// `Allocated To changed from 'alice' to 'bob'`.
    pub fn object_comment(&self) -> String {
        format!(
            "{} changed from '{}' to '{}'",
            title_case(&self.attribute_name),
            self.attribute_prior_state,
            self.attribute_new_state
        )
    }
}

fn title_case(attribute: &str) -> String {
    attribute
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Audit trail entry as returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub object_class: String,
    pub object_id: i64,
    pub date_created: String,
    pub object_comment: String,
}

impl From<&AuditRecord> for HistoryEntry {
    fn from(record: &AuditRecord) -> Self {
        Self {
            object_class: record.object_class.clone(),
            object_id: record.object_id,
            date_created: record.created_at.clone(),
            object_comment: record.object_comment(),
        }
    }
}

/// Query parameters for the audit trail listing. `object_class=all` lists
/// every record.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditTrailQuery {
    pub object_class: String,
    #[serde(default)]
    pub object_id: Option<i64>,
}
