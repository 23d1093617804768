pub mod auth_service;
pub mod case_store;
pub mod storage;
pub mod thumbnail_service;
pub mod upload_service;
pub mod worker;
