use crate::AppState;
use crate::api::error::AppError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::net::SocketAddr;

#[derive(Debug, Clone)]
pub struct WindowEntry {
    pub count: u32,
    pub window_start: DateTime<Utc>,
}

/// Fixed-window request counter keyed by client address.
pub struct RateLimiter {
    windows: DashMap<String, WindowEntry>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests,
            window: Duration::seconds(window_secs as i64),
        }
    }

    /// Counts one request for `key`. On rejection returns the seconds until the window resets.
    pub fn check(&self, key: &str) -> Result<(), i64> {
        self.check_at(key, Utc::now())
    }

    pub fn check_at(&self, key: &str, now: DateTime<Utc>) -> Result<(), i64> {
        let mut entry = self.windows.entry(key.to_string()).or_insert(WindowEntry {
            count: 0,
            window_start: now,
        });

        if now - entry.window_start >= self.window {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count >= self.max_requests {
            let retry_after = (entry.window_start + self.window - now).num_seconds().max(1);
            return Err(retry_after);
        }

        entry.count += 1;
        Ok(())
    }

    /// Drops windows that have fully elapsed. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let now = Utc::now();
        let before = self.windows.len();
        self.windows
            .retain(|_, entry| now - entry.window_start < self.window);
        before - self.windows.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

/// Client address: first `X-Forwarded-For` hop, then `X-Real-IP`, then the socket peer.
pub fn extract_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for")
        && let Ok(val) = forwarded.to_str()
        && let Some(ip) = val.split(',').next()
        && !ip.trim().is_empty()
    {
        return ip.trim().to_string();
    }
    if let Some(real_ip) = headers.get("x-real-ip")
        && let Ok(val) = real_ip.to_str()
    {
        return val.trim().to_string();
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = extract_client_ip(req.headers(), peer);

    if let Err(retry_after) = state.limiter.check(&ip) {
        tracing::warn!(client = %ip, "Rate limit exceeded");
        return Err(AppError::TooManyRequests(format!(
            "Too many requests, please try again in {} seconds",
            retry_after
        )));
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_window_limits_and_resets() {
        let limiter = RateLimiter::new(3, 60);
        let start = Utc::now();

        for _ in 0..3 {
            assert!(limiter.check_at("10.0.0.1", start).is_ok());
        }
        let retry = limiter
            .check_at("10.0.0.1", start + Duration::seconds(20))
            .unwrap_err();
        assert_eq!(retry, 40);

        // Other clients have their own window
        assert!(limiter.check_at("10.0.0.2", start).is_ok());

        // A new window starts once the old one has elapsed
        assert!(limiter
            .check_at("10.0.0.1", start + Duration::seconds(60))
            .is_ok());
    }

    #[test]
    fn test_prune_drops_elapsed_windows() {
        let limiter = RateLimiter::new(5, 60);
        limiter
            .check_at("old", Utc::now() - Duration::seconds(120))
            .unwrap();
        limiter.check("fresh").unwrap();

        assert_eq!(limiter.prune(), 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_extract_client_ip() {
        let peer: SocketAddr = "192.168.1.9:40000".parse().unwrap();

        let mut headers = HeaderMap::new();
        assert_eq!(extract_client_ip(&headers, Some(peer)), "192.168.1.9");
        assert_eq!(extract_client_ip(&headers, None), "unknown");

        headers.insert("x-real-ip", HeaderValue::from_static("203.0.113.5"));
        assert_eq!(extract_client_ip(&headers, Some(peer)), "203.0.113.5");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("198.51.100.7, 10.0.0.1"),
        );
        assert_eq!(extract_client_ip(&headers, Some(peer)), "198.51.100.7");
    }
}
