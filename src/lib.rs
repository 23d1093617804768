pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::api::middleware::rate_limit::RateLimiter;
use crate::config::AppConfig;
use crate::services::auth_service::AuthService;
use crate::services::case_store::CaseStore;
use crate::services::storage::{LocalStorageService, PUBLIC_PREFIX};
use crate::services::upload_service::UploadService;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::auth::logout,
        api::handlers::auth::me,
        api::handlers::cases::list_cases,
        api::handlers::cases::create_case,
        api::handlers::cases::get_case,
        api::handlers::cases::update_case,
        api::handlers::cases::delete_case,
        api::handlers::case_info::list_case_info,
        api::handlers::case_info::create_case_info,
        api::handlers::images::list_case_images,
        api::handlers::images::upload_image,
        api::handlers::images::delete_image,
        api::handlers::images::upload_case_cover,
        api::handlers::documents::list_case_documents,
        api::handlers::documents::upload_document,
        api::handlers::documents::delete_document,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::types::RegisterRequest,
            api::handlers::types::LoginRequest,
            api::handlers::types::CreateCaseRequest,
            api::handlers::types::UpdateCaseRequest,
            api::handlers::types::CreateCaseInfoRequest,
            api::handlers::health::HealthResponse,
            models::PublicUser,
            models::CaseInfo,
            models::InfoData,
            models::InfoCategory,
            models::CaseStatus,
            models::CasePriority,
            models::Confidence,
            models::VerificationStatus,
            entities::cases::Model,
            entities::case_images::Model,
            entities::case_documents::Model,
        )
    ),
    tags(
        (name = "auth", description = "Registration and session endpoints"),
        (name = "cases", description = "Case management"),
        (name = "case-info", description = "Findings recorded against a case"),
        (name = "images", description = "Case images and cover image"),
        (name = "documents", description = "Case documents"),
        (name = "system", description = "Health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub store: Arc<dyn CaseStore>,
    pub storage: Arc<LocalStorageService>,
    pub uploads: Arc<UploadService>,
    pub auth: Arc<AuthService>,
    pub limiter: Arc<RateLimiter>,
    pub config: AppConfig,
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

pub fn create_app(state: AppState) -> Router {
    let auth = || from_fn_with_state(state.clone(), api::middleware::auth::auth_middleware);
    let rate_limited =
        || from_fn_with_state(state.clone(), api::middleware::rate_limit::rate_limit_middleware);

    // Route layers run bottom-up: the limiter counts a request before authentication
    let protected = Router::new()
        .route("/api/auth/me", get(api::handlers::auth::me))
        .route(
            "/api/cases",
            get(api::handlers::cases::list_cases).post(api::handlers::cases::create_case),
        )
        .route(
            "/api/cases/:id",
            get(api::handlers::cases::get_case).patch(api::handlers::cases::update_case),
        )
        .route(
            "/api/cases/:id/info",
            get(api::handlers::case_info::list_case_info)
                .post(api::handlers::case_info::create_case_info),
        )
        .route(
            "/api/cases/:id/images",
            get(api::handlers::images::list_case_images),
        )
        .route(
            "/api/cases/:id/documents",
            get(api::handlers::documents::list_case_documents),
        )
        .route_layer(auth());

    // Deleting a case removes its files, so it shares the upload limit
    let limited = Router::new()
        .route(
            "/api/cases/:id",
            delete(api::handlers::cases::delete_case),
        )
        .route(
            "/api/cases/:id/image",
            post(api::handlers::images::upload_case_cover),
        )
        .route(
            "/api/images/upload",
            post(api::handlers::images::upload_image),
        )
        .route(
            "/api/images/:id",
            delete(api::handlers::images::delete_image),
        )
        .route(
            "/api/documents/upload",
            post(api::handlers::documents::upload_document),
        )
        .route(
            "/api/documents/:id",
            delete(api::handlers::documents::delete_document),
        )
        .route_layer(auth())
        .route_layer(rate_limited());

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/health", get(api::handlers::health::health_check))
        .route("/api/auth/register", post(api::handlers::auth::register))
        .route("/api/auth/login", post(api::handlers::auth::login))
        .route("/api/auth/logout", post(api::handlers::auth::logout))
        .merge(protected)
        .merge(limited)
        .nest_service(PUBLIC_PREFIX, ServeDir::new(state.storage.root()))
        .layer(from_fn(api::middleware::security::security_headers))
        .layer(cors_layer(&state.config))
        // Multipart framing on top of the largest accepted file
        .layer(DefaultBodyLimit::max(state.config.max_file_size + 512 * 1024))
        .with_state(state)
}
