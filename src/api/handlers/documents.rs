use crate::AppState;
use crate::api::error::AppError;
use crate::api::handlers::cases::owned_case;
use crate::api::handlers::{path_id, read_upload_form};
use crate::api::middleware::auth::CurrentUser;
use crate::entities::CaseDocument;
use crate::utils::validation::DOCUMENT_MIME_TYPES;
use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};

#[utoipa::path(
    get,
    path = "/api/cases/{id}/documents",
    params(("id" = i32, Path, description = "Case id")),
    responses(
        (status = 200, description = "Documents attached to the case", body = [CaseDocument]),
        (status = 404, description = "Case not found")
    ),
    tag = "documents"
)]
pub async fn list_case_documents(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<Vec<CaseDocument>>, AppError> {
    let case = owned_case(&state, &id, current.id).await?;
    Ok(Json(
        state.store.get_case_documents(case.id, current.id).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/documents/upload",
    request_body(content = Object, description = "Fields: `document` (file), `caseId`, optional `description` (at most 1000 characters)", content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Document stored", body = CaseDocument),
        (status = 400, description = "Invalid form or per-case document limit reached"),
        (status = 404, description = "Case not found"),
        (status = 413, description = "File too large"),
        (status = 415, description = "Unsupported file type"),
        (status = 429, description = "Too many requests")
    ),
    tag = "documents"
)]
pub async fn upload_document(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<CaseDocument>), AppError> {
    let mut form = read_upload_form(
        multipart,
        "document",
        DOCUMENT_MIME_TYPES,
        state.config.max_file_size,
    )
    .await?;
    let file = form.require_file("document")?;
    let case_id = form.require_case_id()?;

    let document = state
        .uploads
        .upload_document(current.id, case_id, file, form.description()?)
        .await?;
    Ok((StatusCode::CREATED, Json(document)))
}

#[utoipa::path(
    delete,
    path = "/api/documents/{id}",
    params(("id" = i32, Path, description = "Document id")),
    responses(
        (status = 204, description = "Document and its file deleted"),
        (status = 404, description = "Document not found"),
        (status = 429, description = "Too many requests")
    ),
    tag = "documents"
)]
pub async fn delete_document(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = path_id(&id)?;
    state.uploads.delete_document(current.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
