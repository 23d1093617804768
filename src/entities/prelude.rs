pub use super::case_documents::Entity as CaseDocuments;
pub use super::case_images::Entity as CaseImages;
pub use super::case_info::Entity as CaseInfoEntries;
pub use super::cases::Entity as Cases;
pub use super::sessions::Entity as Sessions;
pub use super::users::Entity as Users;
