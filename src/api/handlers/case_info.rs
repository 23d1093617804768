use crate::AppState;
use crate::api::error::AppError;
use crate::api::handlers::cases::owned_case;
use crate::api::handlers::types::{CreateCaseInfoRequest, ValidatedJson};
use crate::api::middleware::auth::CurrentUser;
use crate::models::{CaseInfo, Confidence, NewCaseInfo, VerificationStatus};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};

#[utoipa::path(
    get,
    path = "/api/cases/{id}/info",
    params(("id" = i32, Path, description = "Case id")),
    responses(
        (status = 200, description = "Findings recorded for the case, oldest first", body = [CaseInfo]),
        (status = 404, description = "Case not found")
    ),
    tag = "case-info"
)]
pub async fn list_case_info(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<Vec<CaseInfo>>, AppError> {
    let case = owned_case(&state, &id, current.id).await?;
    Ok(Json(state.store.get_case_info(case.id, current.id).await?))
}

#[utoipa::path(
    post,
    path = "/api/cases/{id}/info",
    params(("id" = i32, Path, description = "Case id")),
    request_body = CreateCaseInfoRequest,
    responses(
        (status = 201, description = "Finding recorded", body = CaseInfo),
        (status = 400, description = "Invalid data"),
        (status = 404, description = "Case not found")
    ),
    tag = "case-info"
)]
pub async fn create_case_info(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<CreateCaseInfoRequest>,
) -> Result<(StatusCode, Json<CaseInfo>), AppError> {
    let case = owned_case(&state, &id, current.id).await?;

    let info = state
        .store
        .create_case_info(NewCaseInfo {
            case_id: case.id,
            owner_id: current.id,
            category: payload.category,
            data: payload.data,
            source: payload.source.filter(|s| !s.trim().is_empty()),
            confidence: payload.confidence.unwrap_or(Confidence::Medium),
            verification_status: payload
                .verification_status
                .unwrap_or(VerificationStatus::Unverified),
        })
        .await?;

    tracing::debug!(case_id = case.id, info_id = info.id, "finding recorded");
    Ok((StatusCode::CREATED, Json(info)))
}
