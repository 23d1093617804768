use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "case_documents")]
#[serde(rename_all = "camelCase")]
#[schema(as = CaseDocument)]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub case_id: i32,
    pub owner_id: i32,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub url: String,
    pub description: Option<String>,
    #[schema(value_type = String, format = DateTime)]
    pub uploaded_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
