//! Document upload endpoint.

use axum::extract::{Multipart, Query, State};

use super::{success, ApiResult};
use crate::auth::RequireUser;
use crate::errors::AppError;
use crate::models::{DocumentView, UploadQuery};
use crate::AppState;

const DOCUMENT_FIELD: &str = "document";

/// POST /api/v1/projects/documents/upload - Store the `document` field and
/// attach it to the project or bug named in the query.
pub async fn upload_document(
    State(state): State<AppState>,
    RequireUser(_user): RequireUser,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> ApiResult<DocumentView> {
    if !state.config.storage_enabled {
        return Err(AppError::BadRequest(
            "Document storage is disabled".to_string(),
        ));
    }

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(DOCUMENT_FIELD) {
            continue;
        }

        let original_name = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| AppError::Validation("Uploaded file has no name".to_string()))?;

        let stored = state
            .documents
            .save_field(query.category, &original_name, field)
            .await?;
        let disk_path = stored.path.to_string_lossy().into_owned();

        let attached = state
            .repo
            .attach_document(
                query.category,
                query.category_id,
                &stored.name,
                &original_name,
                &disk_path,
            )
            .await;

        return match attached {
            Ok(document) => success(DocumentView::from(&document)),
            Err(e) => {
                state.documents.remove(&stored.path).await;
                Err(e)
            }
        };
    }

    Err(AppError::Validation(format!(
        "Multipart field '{}' is required",
        DOCUMENT_FIELD
    )))
}
