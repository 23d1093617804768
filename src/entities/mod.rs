pub mod prelude;

pub mod case_documents;
pub mod case_images;
pub mod case_info;
pub mod cases;
pub mod sessions;
pub mod users;

pub use case_documents::Model as CaseDocument;
pub use case_images::Model as CaseImage;
pub use cases::Model as Case;
