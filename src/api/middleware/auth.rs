use crate::AppState;
use crate::api::error::AppError;
use crate::entities::users;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "sid";

/// The authenticated user, attached to request extensions by [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i32,
    pub user: users::Model,
}

/// Session id from the `sid` cookie, falling back to `Authorization: Bearer <sid>`.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty());

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

pub fn session_cookie(session_id: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE, session_id, max_age_secs
    )
}

pub fn clear_session_cookie() -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", SESSION_COOKIE)
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let unauthorized = || AppError::Unauthorized("Authentication required".to_string());

    let session_id = session_id_from_headers(req.headers()).ok_or_else(unauthorized)?;
    let user = state
        .auth
        .resolve_session(&session_id)
        .await?
        .ok_or_else(unauthorized)?;

    req.extensions_mut().insert(CurrentUser {
        id: user.id,
        user,
    });
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_session_id_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; sid=abc123; lang=en"),
        );
        assert_eq!(session_id_from_headers(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_session_id_from_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer token-xyz"),
        );
        assert_eq!(
            session_id_from_headers(&headers).as_deref(),
            Some("token-xyz")
        );

        headers.insert(header::COOKIE, HeaderValue::from_static("sid=from-cookie"));
        assert_eq!(
            session_id_from_headers(&headers).as_deref(),
            Some("from-cookie")
        );
    }

    #[test]
    fn test_missing_or_empty_session() {
        let mut headers = HeaderMap::new();
        assert!(session_id_from_headers(&headers).is_none());
        headers.insert(header::COOKIE, HeaderValue::from_static("sid="));
        assert!(session_id_from_headers(&headers).is_none());
    }

    #[test]
    fn test_cookie_attributes() {
        let cookie = session_cookie("abc", 3600);
        assert!(cookie.starts_with("sid=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(clear_session_cookie().contains("Max-Age=0"));
    }
}
