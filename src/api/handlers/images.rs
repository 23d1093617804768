use crate::AppState;
use crate::api::error::AppError;
use crate::api::handlers::cases::owned_case;
use crate::api::handlers::{path_id, read_upload_form};
use crate::api::middleware::auth::CurrentUser;
use crate::entities::{Case, CaseImage};
use crate::utils::validation::IMAGE_MIME_TYPES;
use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};

#[utoipa::path(
    get,
    path = "/api/cases/{id}/images",
    params(("id" = i32, Path, description = "Case id")),
    responses(
        (status = 200, description = "Images attached to the case", body = [CaseImage]),
        (status = 404, description = "Case not found")
    ),
    tag = "images"
)]
pub async fn list_case_images(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<Vec<CaseImage>>, AppError> {
    let case = owned_case(&state, &id, current.id).await?;
    Ok(Json(state.store.get_case_images(case.id, current.id).await?))
}

#[utoipa::path(
    post,
    path = "/api/images/upload",
    request_body(content = Object, description = "Fields: `image` (file), `caseId`, optional `description` (at most 1000 characters)", content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Image stored with its thumbnail", body = CaseImage),
        (status = 400, description = "Invalid form or per-case image limit reached"),
        (status = 404, description = "Case not found"),
        (status = 413, description = "File too large"),
        (status = 415, description = "Unsupported file type"),
        (status = 429, description = "Too many requests")
    ),
    tag = "images"
)]
pub async fn upload_image(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<CaseImage>), AppError> {
    let mut form = read_upload_form(
        multipart,
        "image",
        IMAGE_MIME_TYPES,
        state.config.max_file_size,
    )
    .await?;
    let file = form.require_file("image")?;
    let case_id = form.require_case_id()?;

    let image = state
        .uploads
        .upload_image(current.id, case_id, file, form.description()?)
        .await?;
    Ok((StatusCode::CREATED, Json(image)))
}

#[utoipa::path(
    delete,
    path = "/api/images/{id}",
    params(("id" = i32, Path, description = "Image id")),
    responses(
        (status = 204, description = "Image and its files deleted"),
        (status = 404, description = "Image not found"),
        (status = 429, description = "Too many requests")
    ),
    tag = "images"
)]
pub async fn delete_image(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = path_id(&id)?;
    state.uploads.delete_image(current.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Single cover image per case; replaces any previous one.
#[utoipa::path(
    post,
    path = "/api/cases/{id}/image",
    params(("id" = i32, Path, description = "Case id")),
    request_body(content = Object, description = "Field: `image` (file)", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Case with its new cover image", body = Case),
        (status = 404, description = "Case not found"),
        (status = 413, description = "File too large"),
        (status = 415, description = "Unsupported file type"),
        (status = 429, description = "Too many requests")
    ),
    tag = "images"
)]
pub async fn upload_case_cover(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Case>, AppError> {
    let case_id = path_id(&id)?;
    let mut form = read_upload_form(
        multipart,
        "image",
        IMAGE_MIME_TYPES,
        state.config.max_file_size,
    )
    .await?;
    let file = form.require_file("image")?;

    let case = state
        .uploads
        .set_case_cover_image(current.id, case_id, file)
        .await?;
    Ok(Json(case))
}
