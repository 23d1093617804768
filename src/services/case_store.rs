use crate::entities::{prelude::*, *};
use crate::models::{
    CaseInfo, CasePatch, InfoData, InfoDataError, NewCase, NewCaseDocument, NewCaseImage,
    NewCaseInfo, NewUser,
};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, SqlErr,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid id: {0}")]
    InvalidId(i32),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("info data error: {0}")]
    InfoData(#[from] InfoDataError),

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

/// Owner-scoped access to users, cases and everything attached to a case.
///
/// Every case-derived read or write filters on both the entity id and the
/// requesting owner id, so a record owned by someone else behaves exactly like
/// a record that does not exist. Ids must be positive: reads with a bad id
/// return nothing, writes fail with [`StoreError::InvalidId`].
#[async_trait]
pub trait CaseStore: Send + Sync {
    async fn get_user(&self, id: i32) -> Result<Option<users::Model>, StoreError>;
    async fn get_user_by_username(&self, username: &str)
    -> Result<Option<users::Model>, StoreError>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<users::Model>, StoreError>;
    async fn create_user(&self, user: NewUser) -> Result<users::Model, StoreError>;

    async fn get_cases(&self, owner_id: i32) -> Result<Vec<cases::Model>, StoreError>;
    async fn get_case(&self, id: i32, owner_id: i32) -> Result<Option<cases::Model>, StoreError>;
    async fn create_case(&self, case: NewCase) -> Result<cases::Model, StoreError>;
    async fn update_case(
        &self,
        id: i32,
        owner_id: i32,
        patch: CasePatch,
    ) -> Result<cases::Model, StoreError>;
    /// Removes the case row only; attached rows are left to the caller.
    async fn delete_case(&self, id: i32, owner_id: i32) -> Result<bool, StoreError>;

    async fn get_case_info(&self, case_id: i32, owner_id: i32)
    -> Result<Vec<CaseInfo>, StoreError>;
    async fn create_case_info(&self, info: NewCaseInfo) -> Result<CaseInfo, StoreError>;
    async fn delete_case_info_for_case(&self, case_id: i32, owner_id: i32)
    -> Result<u64, StoreError>;

    async fn get_case_images(
        &self,
        case_id: i32,
        owner_id: i32,
    ) -> Result<Vec<case_images::Model>, StoreError>;
    async fn get_case_image(
        &self,
        id: i32,
        owner_id: i32,
    ) -> Result<Option<case_images::Model>, StoreError>;
    async fn count_case_images(&self, case_id: i32, owner_id: i32) -> Result<u64, StoreError>;
    async fn create_case_image(&self, image: NewCaseImage)
    -> Result<case_images::Model, StoreError>;
    /// Removes the row only. Callers delete the files first.
    async fn delete_case_image(&self, id: i32, owner_id: i32) -> Result<bool, StoreError>;

    async fn get_case_documents(
        &self,
        case_id: i32,
        owner_id: i32,
    ) -> Result<Vec<case_documents::Model>, StoreError>;
    async fn get_case_document(
        &self,
        id: i32,
        owner_id: i32,
    ) -> Result<Option<case_documents::Model>, StoreError>;
    async fn count_case_documents(&self, case_id: i32, owner_id: i32)
    -> Result<u64, StoreError>;
    async fn create_case_document(
        &self,
        document: NewCaseDocument,
    ) -> Result<case_documents::Model, StoreError>;
    /// Removes the row only. Callers delete the file first.
    async fn delete_case_document(&self, id: i32, owner_id: i32) -> Result<bool, StoreError>;
}

pub fn is_valid_id(id: i32) -> bool {
    id > 0
}

fn require_ids(ids: &[i32]) -> Result<(), StoreError> {
    match ids.iter().find(|id| !is_valid_id(**id)) {
        Some(bad) => Err(StoreError::InvalidId(*bad)),
        None => Ok(()),
    }
}

fn map_unique_violation(err: DbErr) -> StoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => {
            let message = if detail.contains("email") {
                "Email already registered"
            } else {
                "Username already exists"
            };
            StoreError::Conflict(message.to_string())
        }
        _ => StoreError::Database(err),
    }
}

fn decode_info(row: case_info::Model) -> Result<CaseInfo, StoreError> {
    let data = InfoData::decode(row.category, &row.data)?;
    Ok(CaseInfo {
        id: row.id,
        case_id: row.case_id,
        owner_id: row.owner_id,
        category: row.category,
        data,
        source: row.source,
        confidence: row.confidence,
        verification_status: row.verification_status,
        timestamp: row.timestamp,
    })
}

pub struct SeaOrmCaseStore {
    db: DatabaseConnection,
}

impl SeaOrmCaseStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn require_case(&self, case_id: i32, owner_id: i32) -> Result<cases::Model, StoreError> {
        self.get_case(case_id, owner_id)
            .await?
            .ok_or(StoreError::NotFound("Case"))
    }
}

#[async_trait]
impl CaseStore for SeaOrmCaseStore {
    async fn get_user(&self, id: i32) -> Result<Option<users::Model>, StoreError> {
        if !is_valid_id(id) {
            return Ok(None);
        }
        Ok(Users::find_by_id(id).one(&self.db).await?)
    }

    async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<users::Model>, StoreError> {
        Ok(Users::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.db)
            .await?)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<users::Model>, StoreError> {
        Ok(Users::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await?)
    }

    async fn create_user(&self, user: NewUser) -> Result<users::Model, StoreError> {
        let model = users::ActiveModel {
            username: Set(user.username),
            email: Set(user.email),
            password_hash: Set(user.password_hash),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        model.insert(&self.db).await.map_err(map_unique_violation)
    }

    async fn get_cases(&self, owner_id: i32) -> Result<Vec<cases::Model>, StoreError> {
        if !is_valid_id(owner_id) {
            return Ok(Vec::new());
        }
        Ok(Cases::find()
            .filter(cases::Column::OwnerId.eq(owner_id))
            .order_by_desc(cases::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    async fn get_case(&self, id: i32, owner_id: i32) -> Result<Option<cases::Model>, StoreError> {
        if !is_valid_id(id) || !is_valid_id(owner_id) {
            return Ok(None);
        }
        Ok(Cases::find_by_id(id)
            .filter(cases::Column::OwnerId.eq(owner_id))
            .one(&self.db)
            .await?)
    }

    async fn create_case(&self, case: NewCase) -> Result<cases::Model, StoreError> {
        require_ids(&[case.owner_id])?;
        let now = Utc::now();
        let model = cases::ActiveModel {
            name: Set(case.name),
            description: Set(case.description),
            status: Set(case.status),
            priority: Set(case.priority),
            owner_id: Set(case.owner_id),
            created_at: Set(now),
            updated_at: Set(now),
            image_url: Set(None),
            ..Default::default()
        };
        Ok(model.insert(&self.db).await?)
    }

    async fn update_case(
        &self,
        id: i32,
        owner_id: i32,
        patch: CasePatch,
    ) -> Result<cases::Model, StoreError> {
        require_ids(&[id, owner_id])?;
        let case = self.require_case(id, owner_id).await?;

        let mut active: cases::ActiveModel = case.into();
        if let Some(status) = patch.status {
            active.status = Set(status);
        }
        if let Some(priority) = patch.priority {
            active.priority = Set(priority);
        }
        if let Some(image_url) = patch.image_url {
            active.image_url = Set(image_url);
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(&self.db).await?)
    }

    async fn delete_case(&self, id: i32, owner_id: i32) -> Result<bool, StoreError> {
        require_ids(&[id, owner_id])?;
        let res = Cases::delete_many()
            .filter(cases::Column::Id.eq(id))
            .filter(cases::Column::OwnerId.eq(owner_id))
            .exec(&self.db)
            .await?;
        Ok(res.rows_affected > 0)
    }

    async fn get_case_info(
        &self,
        case_id: i32,
        owner_id: i32,
    ) -> Result<Vec<CaseInfo>, StoreError> {
        if !is_valid_id(case_id) || !is_valid_id(owner_id) {
            return Ok(Vec::new());
        }
        let rows = CaseInfoEntries::find()
            .filter(case_info::Column::CaseId.eq(case_id))
            .filter(case_info::Column::OwnerId.eq(owner_id))
            .order_by_asc(case_info::Column::Timestamp)
            .order_by_asc(case_info::Column::Id)
            .all(&self.db)
            .await?;

        rows.into_iter().map(decode_info).collect()
    }

    async fn create_case_info(&self, info: NewCaseInfo) -> Result<CaseInfo, StoreError> {
        require_ids(&[info.case_id, info.owner_id])?;
        self.require_case(info.case_id, info.owner_id).await?;

        let model = case_info::ActiveModel {
            case_id: Set(info.case_id),
            owner_id: Set(info.owner_id),
            category: Set(info.category),
            data: Set(info.data.encode()?),
            source: Set(info.source),
            confidence: Set(info.confidence),
            verification_status: Set(info.verification_status),
            timestamp: Set(Utc::now()),
            ..Default::default()
        };
        let row = model.insert(&self.db).await?;
        decode_info(row)
    }

    async fn delete_case_info_for_case(
        &self,
        case_id: i32,
        owner_id: i32,
    ) -> Result<u64, StoreError> {
        require_ids(&[case_id, owner_id])?;
        let res = CaseInfoEntries::delete_many()
            .filter(case_info::Column::CaseId.eq(case_id))
            .filter(case_info::Column::OwnerId.eq(owner_id))
            .exec(&self.db)
            .await?;
        Ok(res.rows_affected)
    }

    async fn get_case_images(
        &self,
        case_id: i32,
        owner_id: i32,
    ) -> Result<Vec<case_images::Model>, StoreError> {
        if !is_valid_id(case_id) || !is_valid_id(owner_id) {
            return Ok(Vec::new());
        }
        Ok(CaseImages::find()
            .filter(case_images::Column::CaseId.eq(case_id))
            .filter(case_images::Column::OwnerId.eq(owner_id))
            .order_by_asc(case_images::Column::Id)
            .all(&self.db)
            .await?)
    }

    async fn get_case_image(
        &self,
        id: i32,
        owner_id: i32,
    ) -> Result<Option<case_images::Model>, StoreError> {
        if !is_valid_id(id) || !is_valid_id(owner_id) {
            return Ok(None);
        }
        Ok(CaseImages::find_by_id(id)
            .filter(case_images::Column::OwnerId.eq(owner_id))
            .one(&self.db)
            .await?)
    }

    async fn count_case_images(&self, case_id: i32, owner_id: i32) -> Result<u64, StoreError> {
        if !is_valid_id(case_id) || !is_valid_id(owner_id) {
            return Ok(0);
        }
        Ok(CaseImages::find()
            .filter(case_images::Column::CaseId.eq(case_id))
            .filter(case_images::Column::OwnerId.eq(owner_id))
            .count(&self.db)
            .await?)
    }

    async fn create_case_image(
        &self,
        image: NewCaseImage,
    ) -> Result<case_images::Model, StoreError> {
        require_ids(&[image.case_id, image.owner_id])?;
        self.require_case(image.case_id, image.owner_id).await?;

        let model = case_images::ActiveModel {
            case_id: Set(image.case_id),
            owner_id: Set(image.owner_id),
            file_name: Set(image.file_name),
            file_size: Set(image.file_size),
            mime_type: Set(image.mime_type),
            url: Set(image.url),
            thumbnail: Set(image.thumbnail),
            description: Set(image.description),
            uploaded_at: Set(Utc::now()),
            ..Default::default()
        };
        Ok(model.insert(&self.db).await?)
    }

    async fn delete_case_image(&self, id: i32, owner_id: i32) -> Result<bool, StoreError> {
        require_ids(&[id, owner_id])?;
        let res = CaseImages::delete_many()
            .filter(case_images::Column::Id.eq(id))
            .filter(case_images::Column::OwnerId.eq(owner_id))
            .exec(&self.db)
            .await?;
        Ok(res.rows_affected > 0)
    }

    async fn get_case_documents(
        &self,
        case_id: i32,
        owner_id: i32,
    ) -> Result<Vec<case_documents::Model>, StoreError> {
        if !is_valid_id(case_id) || !is_valid_id(owner_id) {
            return Ok(Vec::new());
        }
        Ok(CaseDocuments::find()
            .filter(case_documents::Column::CaseId.eq(case_id))
            .filter(case_documents::Column::OwnerId.eq(owner_id))
            .order_by_asc(case_documents::Column::Id)
            .all(&self.db)
            .await?)
    }

    async fn get_case_document(
        &self,
        id: i32,
        owner_id: i32,
    ) -> Result<Option<case_documents::Model>, StoreError> {
        if !is_valid_id(id) || !is_valid_id(owner_id) {
            return Ok(None);
        }
        Ok(CaseDocuments::find_by_id(id)
            .filter(case_documents::Column::OwnerId.eq(owner_id))
            .one(&self.db)
            .await?)
    }

    async fn count_case_documents(&self, case_id: i32, owner_id: i32) -> Result<u64, StoreError> {
        if !is_valid_id(case_id) || !is_valid_id(owner_id) {
            return Ok(0);
        }
        Ok(CaseDocuments::find()
            .filter(case_documents::Column::CaseId.eq(case_id))
            .filter(case_documents::Column::OwnerId.eq(owner_id))
            .count(&self.db)
            .await?)
    }

    async fn create_case_document(
        &self,
        document: NewCaseDocument,
    ) -> Result<case_documents::Model, StoreError> {
        require_ids(&[document.case_id, document.owner_id])?;
        self.require_case(document.case_id, document.owner_id)
            .await?;

        let model = case_documents::ActiveModel {
            case_id: Set(document.case_id),
            owner_id: Set(document.owner_id),
            file_name: Set(document.file_name),
            file_size: Set(document.file_size),
            mime_type: Set(document.mime_type),
            url: Set(document.url),
            description: Set(document.description),
            uploaded_at: Set(Utc::now()),
            ..Default::default()
        };
        Ok(model.insert(&self.db).await?)
    }

    async fn delete_case_document(&self, id: i32, owner_id: i32) -> Result<bool, StoreError> {
        require_ids(&[id, owner_id])?;
        let res = CaseDocuments::delete_many()
            .filter(case_documents::Column::Id.eq(id))
            .filter(case_documents::Column::OwnerId.eq(owner_id))
            .exec(&self.db)
            .await?;
        Ok(res.rows_affected > 0)
    }
}
