//! Document attachment model.

use serde::{Deserialize, Serialize};

use super::DocumentCategory;

/// A stored document row.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: i64,
    /// Generated file name on disk
    pub name: String,
    /// Name the file was uploaded with
    pub original_name: String,
    pub category: DocumentCategory,
    pub path: String,
}

impl Document {
    /// URL the document is served under.
    pub fn public_path(&self) -> String {
        format!("/public/{}/{}", self.category.dir_name(), self.name)
    }
}

/// Public view of a document; hides the on-disk location.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentView {
    pub id: i64,
    pub original_name: String,
    pub public_path: String,
}

impl From<&Document> for DocumentView {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id,
            original_name: doc.original_name.clone(),
            public_path: doc.public_path(),
        }
    }
}

/// Query parameters naming what an upload is attached to.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadQuery {
    pub category: DocumentCategory,
    pub category_id: i64,
}
