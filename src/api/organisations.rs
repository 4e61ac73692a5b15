//! Client organisation API endpoints.

use axum::{
    extract::{Query, State},
    Json,
};

use super::{require_text, success, ApiResult, Deleted};
use crate::auth::RequireUser;
use crate::models::{ClientQuery, IdsRequest, Organisation, OrganisationRequest};
use crate::AppState;

/// GET /api/v1/projects/clients - List clients.
pub async fn list_clients(
    State(state): State<AppState>,
    Query(query): Query<ClientQuery>,
) -> ApiResult<Vec<Organisation>> {
    success(state.repo.list_organisations(query.client_id).await?)
}

/// POST /api/v1/projects/clients - Get-or-create a client, or update it when
/// an id is given.
pub async fn save_client(
    State(state): State<AppState>,
    RequireUser(_user): RequireUser,
    Json(request): Json<OrganisationRequest>,
) -> ApiResult<Organisation> {
    require_text(&request.name, "Name")?;
    success(state.repo.save_organisation(&request).await?)
}

/// DELETE /api/v1/projects/clients - Delete clients by id.
pub async fn delete_clients(
    State(state): State<AppState>,
    Json(request): Json<IdsRequest>,
) -> ApiResult<Deleted> {
    let deleted = state.repo.delete_organisations(&request.ids).await?;
    success(Deleted { deleted })
}
