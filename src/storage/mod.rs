//! Document storage on the local filesystem.
//!
//! Files live under `<document_dir>/<category>/<generated name>` and are
//! served back under `/public/<category>/<generated name>`.

use std::path::{Path, PathBuf};

use axum::extract::multipart::Field;
use tokio::io::AsyncWriteExt;

use crate::errors::AppError;
use crate::models::DocumentCategory;

/// A file written to the document directory.
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Generated file name
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the per-category directories.
    pub async fn init(&self) -> Result<(), AppError> {
        for category in [DocumentCategory::Project, DocumentCategory::Bug] {
            tokio::fs::create_dir_all(self.root.join(category.dir_name())).await?;
        }
        Ok(())
    }

    /// Stream an uploaded multipart field to disk under a generated name
    /// that keeps the original extension.
    pub async fn save_field(
        &self,
        category: DocumentCategory,
        original_name: &str,
        mut field: Field<'_>,
    ) -> Result<StoredFile, AppError> {
        let name = generated_name(original_name);
        let dir = self.root.join(category.dir_name());
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(&name);

        let mut file = tokio::fs::File::create(&path).await?;
        let mut size = 0u64;
        loop {
            match field.chunk().await {
                Ok(Some(chunk)) => {
                    file.write_all(&chunk).await?;
                    size += chunk.len() as u64;
                }
                Ok(None) => break,
                Err(e) => {
                    drop(file);
                    // Leave no partial file behind
                    tokio::fs::remove_file(&path).await.ok();
                    return Err(e.into());
                }
            }
        }
        file.flush().await?;

        tracing::info!("Stored document {:?} ({} bytes)", path, size);
        Ok(StoredFile { name, path })
    }

    /// Remove a stored file. Missing files are ignored.
    pub async fn remove(&self, path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!("Failed to remove document {:?}: {}", path, e);
        }
    }
}

/// Random file name keeping the extension of `original_name`.
fn generated_name(original_name: &str) -> String {
    let stem = uuid::Uuid::new_v4().to_string();
    match Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
    {
        Some(ext) => format!("{}.{}", stem, ext.to_ascii_lowercase()),
        None => stem,
    }
}
