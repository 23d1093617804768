use crate::AppState;
use crate::api::error::AppError;
use crate::api::handlers::types::{LoginRequest, RegisterRequest, ValidatedJson};
use crate::api::middleware::auth::{
    CurrentUser, clear_session_cookie, session_cookie, session_id_from_headers,
};
use crate::models::PublicUser;
use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = PublicUser),
        (status = 400, description = "Invalid data"),
        (status = 409, description = "Username or email already taken")
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), AppError> {
    let user = state
        .auth
        .register(&payload.username, &payload.email, &payload.password)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; session cookie set", body = PublicUser),
        (status = 401, description = "Incorrect username or password")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (session_id, user) = state
        .auth
        .login(&payload.username, &payload.password)
        .await?;

    let cookie = session_cookie(&session_id, state.config.session_ttl_hours * 3600);
    Ok(([(header::SET_COOKIE, cookie)], Json(user)))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 204, description = "Session closed")
    ),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    if let Some(session_id) = session_id_from_headers(&headers) {
        state.auth.logout(&session_id).await?;
    }
    Ok((
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, clear_session_cookie())],
    ))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = PublicUser),
        (status = 401, description = "Authentication required")
    ),
    tag = "auth"
)]
pub async fn me(Extension(current): Extension<CurrentUser>) -> Json<PublicUser> {
    Json(current.user.into())
}
