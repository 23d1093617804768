use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    #[default]
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "closed")]
    Closed,
    #[sea_orm(string_value = "pending")]
    Pending,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum CasePriority {
    #[sea_orm(string_value = "low")]
    Low,
    #[default]
    #[sea_orm(string_value = "medium")]
    Medium,
    #[sea_orm(string_value = "high")]
    High,
    #[sea_orm(string_value = "critical")]
    Critical,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    #[sea_orm(string_value = "low")]
    Low,
    #[sea_orm(string_value = "medium")]
    Medium,
    #[sea_orm(string_value = "high")]
    High,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    #[sea_orm(string_value = "unverified")]
    Unverified,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "verified")]
    Verified,
    #[sea_orm(string_value = "disputed")]
    Disputed,
}

/// Kind of finding recorded against a case. Selects the shape of its data.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum InfoCategory {
    #[sea_orm(string_value = "personal_info")]
    PersonalInfo,
    #[sea_orm(string_value = "social_media")]
    SocialMedia,
    #[sea_orm(string_value = "addresses")]
    Addresses,
    #[sea_orm(string_value = "phone_numbers")]
    PhoneNumbers,
    #[sea_orm(string_value = "email_addresses")]
    EmailAddresses,
    #[sea_orm(string_value = "associates")]
    Associates,
    #[sea_orm(string_value = "employment")]
    Employment,
    #[sea_orm(string_value = "education")]
    Education,
    #[sea_orm(string_value = "vehicles")]
    Vehicles,
    #[sea_orm(string_value = "financial")]
    Financial,
    #[sea_orm(string_value = "criminal_records")]
    CriminalRecords,
    #[sea_orm(string_value = "online_presence")]
    OnlinePresence,
    #[sea_orm(string_value = "notes")]
    Notes,
    #[sea_orm(string_value = "other")]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataShape {
    Structured,
    FreeText,
}

impl InfoCategory {
    pub fn data_shape(&self) -> DataShape {
        match self {
            InfoCategory::Notes | InfoCategory::Other => DataShape::FreeText,
            InfoCategory::PersonalInfo
            | InfoCategory::SocialMedia
            | InfoCategory::Addresses
            | InfoCategory::PhoneNumbers
            | InfoCategory::EmailAddresses
            | InfoCategory::Associates
            | InfoCategory::Employment
            | InfoCategory::Education
            | InfoCategory::Vehicles
            | InfoCategory::Financial
            | InfoCategory::CriminalRecords
            | InfoCategory::OnlinePresence => DataShape::Structured,
        }
    }
}

/// Payload of a case finding.
///
/// On the wire and in the `case_info.data` column this is either a JSON object
/// of text fields or a single JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum InfoData {
    Structured(BTreeMap<String, String>),
    FreeText(String),
}

#[derive(Debug, thiserror::Error)]
pub enum InfoDataError {
    #[error("malformed info data: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("{category:?} data must be {expected:?}")]
    ShapeMismatch {
        category: InfoCategory,
        expected: DataShape,
    },
}

impl InfoData {
    pub fn shape(&self) -> DataShape {
        match self {
            InfoData::Structured(_) => DataShape::Structured,
            InfoData::FreeText(_) => DataShape::FreeText,
        }
    }

    /// True when the payload has the shape the category requires and carries content.
    pub fn fits(&self, category: InfoCategory) -> bool {
        if self.shape() != category.data_shape() {
            return false;
        }
        match self {
            InfoData::Structured(fields) => {
                !fields.is_empty() && fields.keys().all(|k| !k.trim().is_empty())
            }
            InfoData::FreeText(text) => !text.trim().is_empty(),
        }
    }

    pub fn encode(&self) -> Result<String, InfoDataError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(category: InfoCategory, raw: &str) -> Result<Self, InfoDataError> {
        let data: InfoData = serde_json::from_str(raw)?;
        let expected = category.data_shape();
        if data.shape() != expected {
            return Err(InfoDataError::ShapeMismatch { category, expected });
        }
        Ok(data)
    }
}

/// A finding with its payload decoded.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CaseInfo {
    pub id: i32,
    pub case_id: i32,
    pub owner_id: i32,
    pub category: InfoCategory,
    pub data: InfoData,
    pub source: Option<String>,
    pub confidence: Confidence,
    pub verification_status: VerificationStatus,
    pub timestamp: DateTime<Utc>,
}

/// User fields safe to hand to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<crate::entities::users::Model> for PublicUser {
    fn from(user: crate::entities::users::Model) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewCase {
    pub owner_id: i32,
    pub name: String,
    pub description: String,
    pub status: CaseStatus,
    pub priority: CasePriority,
}

/// Mutable case fields. `image_url: Some(None)` clears the cover image.
#[derive(Debug, Clone, Default)]
pub struct CasePatch {
    pub status: Option<CaseStatus>,
    pub priority: Option<CasePriority>,
    pub image_url: Option<Option<String>>,
}

#[derive(Debug, Clone)]
pub struct NewCaseInfo {
    pub case_id: i32,
    pub owner_id: i32,
    pub category: InfoCategory,
    pub data: InfoData,
    pub source: Option<String>,
    pub confidence: Confidence,
    pub verification_status: VerificationStatus,
}

#[derive(Debug, Clone)]
pub struct NewCaseImage {
    pub case_id: i32,
    pub owner_id: i32,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub url: String,
    pub thumbnail: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCaseDocument {
    pub case_id: i32,
    pub owner_id: i32,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub url: String,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_data_round_trip() {
        let mut fields = BTreeMap::new();
        fields.insert("street".to_string(), "1 Main St".to_string());
        fields.insert("city".to_string(), "Springfield".to_string());
        let data = InfoData::Structured(fields);

        let raw = data.encode().unwrap();
        assert_eq!(raw, r#"{"city":"Springfield","street":"1 Main St"}"#);
        let decoded = InfoData::decode(InfoCategory::Addresses, &raw).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_free_text_round_trip() {
        let data = InfoData::FreeText("Seen near the docks, \"unverified\"".to_string());
        let raw = data.encode().unwrap();
        let decoded = InfoData::decode(InfoCategory::Notes, &raw).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        let err = InfoData::decode(InfoCategory::Addresses, r#""just text""#).unwrap_err();
        assert!(matches!(err, InfoDataError::ShapeMismatch { .. }));
        assert!(InfoData::decode(InfoCategory::Notes, "{not json").is_err());
    }

    #[test]
    fn test_fits_category() {
        let empty = InfoData::Structured(BTreeMap::new());
        assert!(!empty.fits(InfoCategory::SocialMedia));

        let text = InfoData::FreeText("note".to_string());
        assert!(text.fits(InfoCategory::Notes));
        assert!(!text.fits(InfoCategory::PersonalInfo));
        assert!(!InfoData::FreeText("   ".to_string()).fits(InfoCategory::Other));
    }

    #[test]
    fn test_wire_format_is_untagged() {
        let parsed: InfoData = serde_json::from_str(r#"{"handle":"@falcon"}"#).unwrap();
        assert_eq!(parsed.shape(), DataShape::Structured);
        let parsed: InfoData = serde_json::from_str(r#""free form""#).unwrap();
        assert_eq!(parsed.shape(), DataShape::FreeText);
    }

    #[test]
    fn test_enum_serialization() {
        assert_eq!(
            serde_json::to_string(&VerificationStatus::InProgress).unwrap(),
            r#""in_progress""#
        );
        assert_eq!(CaseStatus::default(), CaseStatus::Active);
        assert_eq!(CasePriority::default(), CasePriority::Medium);
    }
}
