use crate::api::error::AppError;
use crate::models::{
    CasePriority, CaseStatus, Confidence, InfoCategory, InfoData, VerificationStatus,
};
use axum::{
    Json,
    extract::{FromRequest, Request},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

/// JSON body that must deserialize exactly and pass its `validator` rules.
/// Anything else is rejected with 400 `{"error":"Invalid data"}`.
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| {
            tracing::debug!("Rejected request body: {}", e.body_text());
            AppError::invalid_data()
        })?;
        value.validate().map_err(|e| {
            tracing::debug!("Request body failed validation: {}", e);
            AppError::invalid_data()
        })?;
        Ok(Self(value))
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 50), custom(function = "not_blank"))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateCaseRequest {
    #[validate(length(min = 1, max = 200), custom(function = "not_blank"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 10000))]
    pub description: String,
    pub status: Option<CaseStatus>,
    pub priority: Option<CasePriority>,
}

/// Only status and priority may change after creation.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(deny_unknown_fields)]
pub struct UpdateCaseRequest {
    pub status: Option<CaseStatus>,
    pub priority: Option<CasePriority>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[validate(schema(function = "data_matches_category", skip_on_field_errors = false))]
pub struct CreateCaseInfoRequest {
    pub category: InfoCategory,
    pub data: InfoData,
    #[validate(length(max = 500))]
    pub source: Option<String>,
    pub confidence: Option<Confidence>,
    pub verification_status: Option<VerificationStatus>,
}

fn data_matches_category(req: &CreateCaseInfoRequest) -> Result<(), ValidationError> {
    if !req.data.fits(req.category) {
        return Err(ValidationError::new("data_shape"));
    }
    Ok(())
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_rules() {
        let ok: RegisterRequest = serde_json::from_str(
            r#"{"username":"analyst","email":"a@example.com","password":"longenough"}"#,
        )
        .unwrap();
        assert!(ok.validate().is_ok());

        let short: RegisterRequest = serde_json::from_str(
            r#"{"username":"ab","email":"a@example.com","password":"longenough"}"#,
        )
        .unwrap();
        assert!(short.validate().is_err());

        let bad_email: RegisterRequest = serde_json::from_str(
            r#"{"username":"analyst","email":"nope","password":"longenough"}"#,
        )
        .unwrap();
        assert!(bad_email.validate().is_err());

        // Unknown fields never reach validation
        assert!(
            serde_json::from_str::<RegisterRequest>(
                r#"{"username":"analyst","email":"a@example.com","password":"longenough","isAdmin":true}"#
            )
            .is_err()
        );
    }

    #[test]
    fn test_case_info_data_must_fit_category() {
        let structured: CreateCaseInfoRequest = serde_json::from_str(
            r#"{"category":"phone_numbers","data":{"mobile":"+1 555 0100"},"confidence":"high"}"#,
        )
        .unwrap();
        assert!(structured.validate().is_ok());

        let wrong_shape: CreateCaseInfoRequest =
            serde_json::from_str(r#"{"category":"phone_numbers","data":"+1 555 0100"}"#).unwrap();
        assert!(wrong_shape.validate().is_err());

        let note: CreateCaseInfoRequest =
            serde_json::from_str(r#"{"category":"notes","data":"Seen near the docks"}"#).unwrap();
        assert!(note.validate().is_ok());

        let empty_note: CreateCaseInfoRequest =
            serde_json::from_str(r#"{"category":"notes","data":"  "}"#).unwrap();
        assert!(empty_note.validate().is_err());

        assert!(
            serde_json::from_str::<CreateCaseInfoRequest>(
                r#"{"category":"not_a_category","data":"x"}"#
            )
            .is_err()
        );
    }

    #[test]
    fn test_update_case_rejects_other_fields() {
        assert!(serde_json::from_str::<UpdateCaseRequest>(r#"{"status":"closed"}"#).is_ok());
        assert!(serde_json::from_str::<UpdateCaseRequest>(r#"{"name":"renamed"}"#).is_err());
        assert!(serde_json::from_str::<UpdateCaseRequest>(r#"{"priority":"urgent"}"#).is_err());
    }
}
