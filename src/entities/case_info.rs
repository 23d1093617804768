use crate::models::{Confidence, InfoCategory, VerificationStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Raw `case_info` row. `data` holds the JSON-encoded [`crate::models::InfoData`].
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "case_info")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub case_id: i32,
    pub owner_id: i32,
    pub category: InfoCategory,
    #[sea_orm(column_type = "Text")]
    pub data: String,
    pub source: Option<String>,
    pub confidence: Confidence,
    pub verification_status: VerificationStatus,
    pub timestamp: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
