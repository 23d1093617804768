use crate::AppState;
use crate::api::error::AppError;
use crate::api::handlers::path_id;
use crate::api::handlers::types::{CreateCaseRequest, UpdateCaseRequest, ValidatedJson};
use crate::api::middleware::auth::CurrentUser;
use crate::entities::Case;
use crate::models::{CasePatch, NewCase};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};

/// Loads a case or fails with 404. Used by every case-scoped route.
pub(crate) async fn owned_case(
    state: &AppState,
    raw_id: &str,
    owner_id: i32,
) -> Result<Case, AppError> {
    let id = path_id(raw_id)?;
    state
        .store
        .get_case(id, owner_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Case not found".to_string()))
}

#[utoipa::path(
    get,
    path = "/api/cases",
    responses(
        (status = 200, description = "Cases owned by the current user", body = [Case]),
        (status = 401, description = "Authentication required")
    ),
    tag = "cases"
)]
pub async fn list_cases(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Vec<Case>>, AppError> {
    Ok(Json(state.store.get_cases(current.id).await?))
}

#[utoipa::path(
    post,
    path = "/api/cases",
    request_body = CreateCaseRequest,
    responses(
        (status = 201, description = "Case created", body = Case),
        (status = 400, description = "Invalid data")
    ),
    tag = "cases"
)]
pub async fn create_case(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ValidatedJson(payload): ValidatedJson<CreateCaseRequest>,
) -> Result<(StatusCode, Json<Case>), AppError> {
    let case = state
        .store
        .create_case(NewCase {
            owner_id: current.id,
            name: payload.name.trim().to_string(),
            description: payload.description,
            status: payload.status.unwrap_or_default(),
            priority: payload.priority.unwrap_or_default(),
        })
        .await?;

    tracing::info!(case_id = case.id, user_id = current.id, "📁 Case created");
    Ok((StatusCode::CREATED, Json(case)))
}

#[utoipa::path(
    get,
    path = "/api/cases/{id}",
    params(("id" = i32, Path, description = "Case id")),
    responses(
        (status = 200, description = "Case", body = Case),
        (status = 404, description = "Case not found")
    ),
    tag = "cases"
)]
pub async fn get_case(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<Case>, AppError> {
    Ok(Json(owned_case(&state, &id, current.id).await?))
}

#[utoipa::path(
    patch,
    path = "/api/cases/{id}",
    params(("id" = i32, Path, description = "Case id")),
    request_body = UpdateCaseRequest,
    responses(
        (status = 200, description = "Case updated", body = Case),
        (status = 400, description = "Invalid data"),
        (status = 404, description = "Case not found")
    ),
    tag = "cases"
)]
pub async fn update_case(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<UpdateCaseRequest>,
) -> Result<Json<Case>, AppError> {
    let id = path_id(&id)?;
    let patch = CasePatch {
        status: payload.status,
        priority: payload.priority,
        image_url: None,
    };
    Ok(Json(state.store.update_case(id, current.id, patch).await?))
}

#[utoipa::path(
    delete,
    path = "/api/cases/{id}",
    params(("id" = i32, Path, description = "Case id")),
    responses(
        (status = 204, description = "Case and everything attached to it deleted"),
        (status = 404, description = "Case not found")
    ),
    tag = "cases"
)]
pub async fn delete_case(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = path_id(&id)?;
    state.uploads.delete_case(current.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
