//! Project API endpoints.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Serialize;

use super::{require_text, success, ApiResult, Deleted};
use crate::auth::RequireUser;
use crate::models::{
    IdsRequest, ProjectDetail, ProjectListing, ProjectQuery, ProjectRequest, Saved,
};
use crate::AppState;

/// A single project in full, or a list of project summaries.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ProjectsView {
    Detail(Box<ProjectDetail>),
    Listings(Vec<ProjectListing>),
}

/// GET /api/v1/projects - One project by `project_id`, or the listings
/// (optionally for one `client_id`).
pub async fn get_projects(
    State(state): State<AppState>,
    Query(query): Query<ProjectQuery>,
) -> ApiResult<ProjectsView> {
    match query.project_id {
        Some(id) => success(ProjectsView::Detail(Box::new(
            state.repo.get_project(id).await?,
        ))),
        None => success(ProjectsView::Listings(
            state.repo.list_projects(&query).await?,
        )),
    }
}

/// POST /api/v1/projects - Create a project, or update it when an id is
/// given.
pub async fn save_project(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(request): Json<ProjectRequest>,
) -> ApiResult<Saved<ProjectListing>> {
    require_text(&request.name, "Name")?;
    success(state.repo.save_project(&request, user.id).await?)
}

/// DELETE /api/v1/projects - Delete projects by id.
pub async fn delete_projects(
    State(state): State<AppState>,
    Json(request): Json<IdsRequest>,
) -> ApiResult<Deleted> {
    let deleted = state.repo.delete_projects(&request.ids).await?;
    success(Deleted { deleted })
}
