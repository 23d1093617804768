pub mod auth;
pub mod case_info;
pub mod cases;
pub mod documents;
pub mod health;
pub mod images;
pub mod types;

use crate::api::error::AppError;
use crate::services::upload_service::IncomingFile;
use crate::utils::validation::{parse_id, validate_mime_type};
use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use bytes::BytesMut;

/// Path ids that are not positive integers cannot name anything.
pub(crate) fn path_id(raw: &str) -> Result<i32, AppError> {
    parse_id(raw).ok_or_else(|| AppError::NotFound("Not found".to_string()))
}

/// Longest accepted upload `description`.
pub const MAX_DESCRIPTION_CHARS: usize = 1000;

/// Fields of an upload form.
#[derive(Debug, Default)]
pub(crate) struct UploadForm {
    pub file: Option<IncomingFile>,
    pub case_id: Option<String>,
    pub description: Option<String>,
}

impl UploadForm {
    pub fn require_file(&mut self, field: &str) -> Result<IncomingFile, AppError> {
        self.file
            .take()
            .ok_or_else(|| AppError::BadRequest(format!("Missing '{}' file field", field)))
    }

    pub fn require_case_id(&self) -> Result<i32, AppError> {
        self.case_id
            .as_deref()
            .and_then(parse_id)
            .ok_or_else(AppError::invalid_data)
    }

    /// Trimmed description. Blank is `None`; longer than [`MAX_DESCRIPTION_CHARS`] is invalid.
    pub fn description(&self) -> Result<Option<String>, AppError> {
        match self.description.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(d) if d.chars().count() > MAX_DESCRIPTION_CHARS => Err(AppError::invalid_data()),
            Some(d) => Ok(Some(d.to_string())),
        }
    }
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body too large".to_string())
    } else {
        AppError::BadRequest(e.body_text())
    }
}

/// Buffers the form. The file's declared type is checked against `allowed` before any
/// of its bytes are read, and reading stops as soon as it grows past `max_size`.
pub(crate) async fn read_upload_form(
    mut multipart: Multipart,
    file_field: &str,
    allowed: &[&str],
    max_size: usize,
) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        if name == file_field {
            let original_name = field.file_name().unwrap_or("upload").to_string();
            let content_type = field
                .content_type()
                .map(str::to_string)
                .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string());
            validate_mime_type(&content_type, allowed)?;

            let mut buf = BytesMut::new();
            while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                if buf.len() + chunk.len() > max_size {
                    return Err(AppError::PayloadTooLarge(format!(
                        "File exceeds maximum allowed size of {} MB",
                        max_size / 1024 / 1024
                    )));
                }
                buf.extend_from_slice(&chunk);
            }

            form.file = Some(IncomingFile {
                original_name,
                content_type,
                data: buf.freeze(),
            });
        } else if name == "caseId" {
            form.case_id = Some(field.text().await.map_err(multipart_error)?);
        } else if name == "description" {
            form.description = Some(field.text().await.map_err(multipart_error)?);
        } else {
            tracing::debug!("Ignoring unexpected form field '{}'", name);
        }
    }

    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(description: &str) -> UploadForm {
        UploadForm {
            description: Some(description.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_description_limits() {
        assert_eq!(UploadForm::default().description().unwrap(), None);
        assert_eq!(form("   ").description().unwrap(), None);
        assert_eq!(
            form("  seen at the pier ").description().unwrap().as_deref(),
            Some("seen at the pier")
        );

        // Counted in characters, not bytes
        let at_limit = "é".repeat(MAX_DESCRIPTION_CHARS);
        assert_eq!(form(&at_limit).description().unwrap(), Some(at_limit));
        assert!(matches!(
            form(&"x".repeat(MAX_DESCRIPTION_CHARS + 1)).description(),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_case_id_must_be_positive() {
        let mut form = UploadForm::default();
        assert!(form.require_case_id().is_err());
        form.case_id = Some("0".to_string());
        assert!(form.require_case_id().is_err());
        form.case_id = Some(" 12 ".to_string());
        assert_eq!(form.require_case_id().unwrap(), 12);
    }
}
