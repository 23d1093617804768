use crate::api::error::AppError;
use crate::entities::{case_documents, case_images, cases};
use crate::models::{CasePatch, NewCaseDocument, NewCaseImage};
use crate::services::case_store::CaseStore;
use crate::services::storage::StorageService;
use crate::services::thumbnail_service::ThumbnailService;
use crate::utils::validation::{
    DOCUMENT_MIME_TYPES, IMAGE_MIME_TYPES, unique_file_name, validate_file_size,
    validate_mime_type, verify_content,
};
use bytes::Bytes;
use futures::future::join_all;
use std::path::Path;
use std::sync::Arc;

/// Key prefix for derived thumbnails.
pub const THUMBNAIL_DIR: &str = "thumbnails";

/// Key prefix for legacy per-case cover images.
pub const CASE_IMAGE_DIR: &str = "cases";

/// A fully buffered multipart file.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub original_name: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Moves uploads from the wire to disk to a committed row, undoing disk writes on any failure.
pub struct UploadService {
    store: Arc<dyn CaseStore>,
    storage: Arc<dyn StorageService>,
    thumbnails: ThumbnailService,
    max_file_size: usize,
    max_files_per_case: u64,
}

impl UploadService {
    pub fn new(
        store: Arc<dyn CaseStore>,
        storage: Arc<dyn StorageService>,
        thumbnails: ThumbnailService,
        max_file_size: usize,
        max_files_per_case: u64,
    ) -> Self {
        Self {
            store,
            storage,
            thumbnails,
            max_file_size,
            max_files_per_case,
        }
    }

    /// Type, size and content checks. Nothing touches the disk before these pass.
    fn validate(&self, file: &IncomingFile, allowed: &[&str]) -> Result<String, AppError> {
        let mime = validate_mime_type(&file.content_type, allowed)?;
        validate_file_size(file.data.len(), self.max_file_size)?;
        verify_content(&file.data, &mime)?;
        Ok(mime)
    }

    /// Best-effort removal of files written during a failed or finished request.
    async fn discard(&self, keys: &[String]) {
        let results = join_all(keys.iter().map(|key| self.storage.delete_file(key))).await;
        for (key, result) in keys.iter().zip(results) {
            if let Err(e) = result {
                tracing::warn!(storage_key = %key, "Failed to remove file: {}", e);
            }
        }
    }

    async fn discard_url(&self, url: &str) {
        match self.storage.key_from_url(url) {
            Some(key) => self.discard(&[key]).await,
            None => tracing::warn!("Not removing file outside the upload root: {}", url),
        }
    }

    pub async fn upload_image(
        &self,
        owner_id: i32,
        case_id: i32,
        file: IncomingFile,
        description: Option<String>,
    ) -> Result<case_images::Model, AppError> {
        let mime = self.validate(&file, IMAGE_MIME_TYPES)?;

        let stored_name = unique_file_name(&file.original_name, &mime);
        self.storage.upload_file(&stored_name, &file.data).await?;
        let mut written = vec![stored_name.clone()];

        let count = match self.store.count_case_images(case_id, owner_id).await {
            Ok(count) => count,
            Err(e) => {
                self.discard(&written).await;
                return Err(e.into());
            }
        };
        if count >= self.max_files_per_case {
            self.discard(&written).await;
            return Err(AppError::BadRequest(format!(
                "Maximum {} images per case",
                self.max_files_per_case
            )));
        }

        let thumb = match self.thumbnails.generate(file.data.to_vec()).await {
            Ok(thumb) => thumb,
            Err(e) => {
                self.discard(&written).await;
                return Err(AppError::Internal(format!(
                    "Thumbnail generation failed for {}: {}",
                    stored_name, e
                )));
            }
        };

        let thumb_key = thumbnail_key(&stored_name);
        if let Err(e) = self.storage.upload_file(&thumb_key, &thumb).await {
            // The thumbnail may be partially there; remove both
            written.push(thumb_key);
            self.discard(&written).await;
            return Err(e.into());
        }
        written.push(thumb_key.clone());

        let record = NewCaseImage {
            case_id,
            owner_id,
            file_name: file.original_name,
            file_size: file.data.len() as i64,
            mime_type: mime,
            url: self.storage.public_url(&stored_name),
            thumbnail: self.storage.public_url(&thumb_key),
            description,
        };

        match self.store.create_case_image(record).await {
            Ok(image) => {
                tracing::info!(
                    case_id,
                    image_id = image.id,
                    size = image.file_size,
                    "🖼️ Image uploaded"
                );
                Ok(image)
            }
            Err(e) => {
                self.discard(&written).await;
                Err(e.into())
            }
        }
    }

    pub async fn upload_document(
        &self,
        owner_id: i32,
        case_id: i32,
        file: IncomingFile,
        description: Option<String>,
    ) -> Result<case_documents::Model, AppError> {
        let mime = self.validate(&file, DOCUMENT_MIME_TYPES)?;

        let stored_name = unique_file_name(&file.original_name, &mime);
        self.storage.upload_file(&stored_name, &file.data).await?;
        let written = vec![stored_name.clone()];

        let count = match self.store.count_case_documents(case_id, owner_id).await {
            Ok(count) => count,
            Err(e) => {
                self.discard(&written).await;
                return Err(e.into());
            }
        };
        if count >= self.max_files_per_case {
            self.discard(&written).await;
            return Err(AppError::BadRequest(format!(
                "Maximum {} documents per case",
                self.max_files_per_case
            )));
        }

        let record = NewCaseDocument {
            case_id,
            owner_id,
            file_name: file.original_name,
            file_size: file.data.len() as i64,
            mime_type: mime,
            url: self.storage.public_url(&stored_name),
            description,
        };

        match self.store.create_case_document(record).await {
            Ok(document) => {
                tracing::info!(
                    case_id,
                    document_id = document.id,
                    size = document.file_size,
                    "📄 Document uploaded"
                );
                Ok(document)
            }
            Err(e) => {
                self.discard(&written).await;
                Err(e.into())
            }
        }
    }

    pub async fn delete_image(&self, owner_id: i32, id: i32) -> Result<(), AppError> {
        let image = self
            .store
            .get_case_image(id, owner_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Image not found".to_string()))?;

        self.discard_url(&image.url).await;
        self.discard_url(&image.thumbnail).await;
        self.store.delete_case_image(image.id, owner_id).await?;

        tracing::info!(case_id = image.case_id, image_id = image.id, "🗑️ Image deleted");
        Ok(())
    }

    pub async fn delete_document(&self, owner_id: i32, id: i32) -> Result<(), AppError> {
        let document = self
            .store
            .get_case_document(id, owner_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Document not found".to_string()))?;

        self.discard_url(&document.url).await;
        self.store.delete_case_document(document.id, owner_id).await?;

        tracing::info!(
            case_id = document.case_id,
            document_id = document.id,
            "🗑️ Document deleted"
        );
        Ok(())
    }

    /// Replaces the cover image of a case. The previous cover file is removed once the
    /// case points at the new one.
    pub async fn set_case_cover_image(
        &self,
        owner_id: i32,
        case_id: i32,
        file: IncomingFile,
    ) -> Result<cases::Model, AppError> {
        let mime = self.validate(&file, IMAGE_MIME_TYPES)?;

        let case = self
            .store
            .get_case(case_id, owner_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Case not found".to_string()))?;

        let key = format!(
            "{}/{}",
            CASE_IMAGE_DIR,
            unique_file_name(&file.original_name, &mime)
        );
        self.storage.upload_file(&key, &file.data).await?;

        let patch = CasePatch {
            image_url: Some(Some(self.storage.public_url(&key))),
            ..Default::default()
        };
        let updated = match self.store.update_case(case.id, owner_id, patch).await {
            Ok(updated) => updated,
            Err(e) => {
                self.discard(&[key]).await;
                return Err(e.into());
            }
        };

        if let Some(previous) = case.image_url.as_deref() {
            self.discard_url(previous).await;
        }

        tracing::info!(case_id, "🖼️ Case cover image updated");
        Ok(updated)
    }

    /// Deletes a case together with everything attached to it: image and document files
    /// and rows, info rows and the cover image.
    pub async fn delete_case(&self, owner_id: i32, case_id: i32) -> Result<(), AppError> {
        let case = self
            .store
            .get_case(case_id, owner_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Case not found".to_string()))?;

        for image in self.store.get_case_images(case.id, owner_id).await? {
            self.discard_url(&image.url).await;
            self.discard_url(&image.thumbnail).await;
            self.store.delete_case_image(image.id, owner_id).await?;
        }

        for document in self.store.get_case_documents(case.id, owner_id).await? {
            self.discard_url(&document.url).await;
            self.store.delete_case_document(document.id, owner_id).await?;
        }

        let info_rows = self
            .store
            .delete_case_info_for_case(case.id, owner_id)
            .await?;

        if let Some(cover) = case.image_url.as_deref() {
            self.discard_url(cover).await;
        }

        if !self.store.delete_case(case.id, owner_id).await? {
            return Err(AppError::NotFound("Case not found".to_string()));
        }

        tracing::info!(case_id, info_rows, "🗑️ Case deleted");
        Ok(())
    }
}

/// `photo-1-2.png` -> `thumbnails/thumb-photo-1-2.jpg`
pub fn thumbnail_key(stored_name: &str) -> String {
    let stem = Path::new(stored_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(stored_name);
    format!("{}/thumb-{}.jpg", THUMBNAIL_DIR, stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_key() {
        assert_eq!(
            thumbnail_key("photo-1700000000000-42.png"),
            "thumbnails/thumb-photo-1700000000000-42.jpg"
        );
        assert_eq!(thumbnail_key("noext"), "thumbnails/thumb-noext.jpg");
    }
}
