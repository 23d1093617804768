use axum::{
    body::Body,
    extract::Request,
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

pub async fn security_headers(req: Request, next: Next) -> Response {
    // Reject TRACE and TRACK (proxy disclosure)
    let method = req.method();
    if method == "TRACE" || method == "TRACK" {
        return (StatusCode::METHOD_NOT_ALLOWED, Body::empty()).into_response();
    }

    // Uploaded files are served as-is; API responses are never cached
    let is_static = req.uri().path().starts_with("/uploads/");

    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        header::HeaderValue::from_static("nosniff"),
    );

    headers.insert(
        header::X_FRAME_OPTIONS,
        header::HeaderValue::from_static("DENY"),
    );

    headers.insert(
        header::REFERRER_POLICY,
        header::HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    headers.insert(
        header::HeaderName::from_static("permissions-policy"),
        header::HeaderValue::from_static("camera=(), microphone=(), geolocation=(), payment=()"),
    );

    // Let the frontend on another origin embed thumbnails and covers
    headers.insert(
        header::HeaderName::from_static("cross-origin-resource-policy"),
        header::HeaderValue::from_static("cross-origin"),
    );

    // Suppress fingerprinting
    headers.insert(
        header::SERVER,
        header::HeaderValue::from_static("osint-case-backend"),
    );

    if !is_static && !headers.contains_key(header::CACHE_CONTROL) {
        headers.insert(
            header::CACHE_CONTROL,
            header::HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        );
    }

    response
}
