//! JSON API for the authoring application: project lifecycle under `/api/projects`.
//!
//! Callers are identified by the `x-user-id` header, set by the authentication
//! layer in front of this service.

use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, State},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::application::error::HttpError;
use crate::domain::projects::{ContentUpdate, DesignUpdate, ProjectRecord};

use super::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated owner of the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerId(pub Uuid);

impl<S> FromRequestParts<S> for OwnerId
where
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        const SOURCE: &str = "infra::http::api::owner_id";

        let value = parts.headers.get(USER_ID_HEADER).ok_or_else(|| {
            HttpError::new(
                SOURCE,
                StatusCode::UNAUTHORIZED,
                "Authentication required",
                "missing x-user-id header",
            )
        })?;

        value
            .to_str()
            .ok()
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
            .map(OwnerId)
            .ok_or_else(|| {
                HttpError::new(
                    SOURCE,
                    StatusCode::UNAUTHORIZED,
                    "Invalid credentials",
                    "x-user-id is not a uuid",
                )
            })
    }
}

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/projects", get(list_projects).post(create_project))
        .route(
            "/api/projects/{id}",
            get(get_project).put(rename_project).delete(delete_project),
        )
        .route("/api/projects/{id}/content", put(update_content))
        .route("/api/projects/{id}/colors", put(update_colors))
        .route("/api/projects/{id}/slug", put(change_slug))
        .route("/api/projects/{id}/publish", post(publish_project))
        .route(
            "/api/projects/{id}/unpublish",
            post(unpublish_project).delete(unpublish_project),
        )
        .route("/api/projects/{id}/preview", get(preview_project))
}

#[derive(Debug, Deserialize)]
struct NamePayload {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SlugPayload {
    slug: String,
}

fn with_message(message: &str, project: &ProjectRecord) -> Response {
    Json(json!({ "message": message, "project": project })).into_response()
}

fn project_id(raw: &str) -> Result<Uuid, HttpError> {
    Uuid::parse_str(raw).map_err(|err| {
        HttpError::new(
            "infra::http::api::project_id",
            StatusCode::BAD_REQUEST,
            "Invalid project ID",
            err.to_string(),
        )
    })
}

async fn list_projects(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
) -> Result<Response, HttpError> {
    let projects = state.projects.list(owner).await?;
    let count = projects.len();
    Ok(Json(json!({ "projects": projects, "count": count })).into_response())
}

async fn create_project(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Json(payload): Json<NamePayload>,
) -> Result<Response, HttpError> {
    let project = state.projects.create(owner, &payload.name).await?;
    let mut response = with_message("Project created successfully", &project);
    *response.status_mut() = StatusCode::CREATED;
    Ok(response)
}

async fn get_project(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(id): Path<String>,
) -> Result<Response, HttpError> {
    let project = state.projects.get(owner, project_id(&id)?).await?;
    Ok(Json(json!({ "project": project })).into_response())
}

async fn rename_project(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(id): Path<String>,
    Json(payload): Json<NamePayload>,
) -> Result<Response, HttpError> {
    let project = state
        .projects
        .rename(owner, project_id(&id)?, &payload.name)
        .await?;
    Ok(with_message("Project updated successfully", &project))
}

async fn delete_project(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(id): Path<String>,
) -> Result<Response, HttpError> {
    state.projects.delete(owner, project_id(&id)?).await?;
    Ok(Json(json!({ "message": "Project deleted successfully" })).into_response())
}

async fn update_content(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(id): Path<String>,
    Json(payload): Json<ContentUpdate>,
) -> Result<Response, HttpError> {
    let project = state
        .projects
        .update_content(owner, project_id(&id)?, payload)
        .await?;
    Ok(with_message("Content updated successfully", &project))
}

async fn update_colors(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(id): Path<String>,
    Json(payload): Json<DesignUpdate>,
) -> Result<Response, HttpError> {
    let project = state
        .projects
        .update_design(owner, project_id(&id)?, payload)
        .await?;
    Ok(with_message("Colors updated successfully", &project))
}

async fn change_slug(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(id): Path<String>,
    Json(payload): Json<SlugPayload>,
) -> Result<Response, HttpError> {
    let project = state
        .projects
        .change_slug(owner, project_id(&id)?, &payload.slug)
        .await?;
    Ok(with_message("Slug updated successfully", &project))
}

async fn publish_project(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(id): Path<String>,
) -> Result<Response, HttpError> {
    let published = state.projects.publish(owner, project_id(&id)?).await?;
    Ok(Json(json!({
        "message": "Project published successfully",
        "project": published.project,
        "siteUrl": published.site_url,
    }))
    .into_response())
}

async fn unpublish_project(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(id): Path<String>,
) -> Result<Response, HttpError> {
    let project = state.projects.unpublish(owner, project_id(&id)?).await?;
    Ok(with_message("Project unpublished successfully", &project))
}

async fn preview_project(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(id): Path<String>,
) -> Result<Response, HttpError> {
    let (project, preview) = state.projects.preview(owner, project_id(&id)?).await?;
    Ok(Json(json!({ "project": project, "preview": preview })).into_response())
}
