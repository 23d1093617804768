#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use osint_case_backend::api::middleware::rate_limit::RateLimiter;
use osint_case_backend::config::AppConfig;
use osint_case_backend::infrastructure::{database, storage};
use osint_case_backend::services::auth_service::AuthService;
use osint_case_backend::services::case_store::{CaseStore, SeaOrmCaseStore};
use osint_case_backend::services::thumbnail_service::ThumbnailService;
use osint_case_backend::services::upload_service::UploadService;
use osint_case_backend::{AppState, create_app};
use serde_json::{Value, json};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub upload_dir: PathBuf,
    _dir: TempDir,
}

pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("osint_case_backend=debug"))
        .with(fmt::layer().with_test_writer())
        .try_init();
}

/// Development config rooted in a fresh temp directory.
pub fn test_config(dir: &Path) -> AppConfig {
    let data_dir = dir.join("data");
    AppConfig {
        database_url: format!("sqlite://{}/cases.db", data_dir.display()),
        data_dir,
        upload_dir: dir.join("uploads"),
        ..AppConfig::development()
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

pub async fn spawn_app_with(customize: impl FnOnce(&mut AppConfig)) -> TestApp {
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    customize(&mut config);

    let db = database::setup_database(&config).await.unwrap();
    let local_storage = storage::setup_storage(&config).await.unwrap();

    let store: Arc<dyn CaseStore> = Arc::new(SeaOrmCaseStore::new(db.clone()));
    let auth = Arc::new(AuthService::new(
        db.clone(),
        store.clone(),
        config.session_ttl_hours,
    ));
    let uploads = Arc::new(UploadService::new(
        store.clone(),
        local_storage.clone(),
        ThumbnailService::default(),
        config.max_file_size,
        config.max_files_per_case,
    ));
    let limiter = Arc::new(RateLimiter::new(
        config.rate_limit_max_requests,
        config.rate_limit_window_secs,
    ));

    let upload_dir = config.upload_dir.clone();
    let state = AppState {
        db,
        store,
        storage: local_storage,
        uploads,
        auth,
        limiter,
        config,
    };

    TestApp {
        app: create_app(state.clone()),
        state,
        upload_dir,
        _dir: dir,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn json(
        &self,
        method: &str,
        uri: &str,
        cookie: Option<&str>,
        body: Value,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        self.bodiless("GET", uri, cookie).await
    }

    pub async fn delete(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        self.bodiless("DELETE", uri, cookie).await
    }

    async fn bodiless(&self, method: &str, uri: &str, cookie: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// Registers `username` and logs in. Returns the `sid=...` cookie pair.
    pub async fn login_as(&self, username: &str) -> String {
        let res = self
            .json(
                "POST",
                "/api/auth/register",
                None,
                json!({
                    "username": username,
                    "email": format!("{}@example.com", username),
                    "password": "password123"
                }),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{:?}", res.body);

        let res = self
            .json(
                "POST",
                "/api/auth/login",
                None,
                json!({"username": username, "password": "password123"}),
            )
            .await;
        assert_eq!(res.status, StatusCode::OK, "{:?}", res.body);
        session_cookie(&res.headers)
    }

    pub async fn create_case(&self, cookie: &str, name: &str) -> i64 {
        let res = self
            .json(
                "POST",
                "/api/cases",
                Some(cookie),
                json!({"name": name, "description": "test case"}),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{:?}", res.body);
        res.body["id"].as_i64().unwrap()
    }

    pub async fn upload(
        &self,
        uri: &str,
        cookie: &str,
        file: &MultipartFile<'_>,
        fields: &[(&str, String)],
    ) -> TestResponse {
        let boundary = "---------------------------974767299852498929531610575";
        let body = multipart_body(boundary, file, fields);
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::COOKIE, cookie)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Maps a `/uploads/...` URL back onto the upload directory.
    pub fn path_for_url(&self, url: &str) -> PathBuf {
        self.upload_dir
            .join(url.strip_prefix("/uploads/").expect("upload url"))
    }
}

pub fn session_cookie(headers: &HeaderMap) -> String {
    headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .expect("session cookie")
        .to_string()
}

pub struct MultipartFile<'a> {
    pub field: &'a str,
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub data: &'a [u8],
}

pub fn multipart_body(boundary: &str, file: &MultipartFile<'_>, fields: &[(&str, String)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            file.field, file.file_name, file.content_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(file.data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]));
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    out
}

/// A PNG whose header is intact but whose pixel data is cut off.
pub fn corrupt_png() -> Vec<u8> {
    let mut bytes = png_bytes(64, 64);
    bytes.truncate(40);
    bytes
}

pub fn pdf_bytes() -> Vec<u8> {
    b"%PDF-1.4\n1 0 obj << /Type /Catalog >> endobj\ntrailer << /Root 1 0 R >>\n%%EOF\n".to_vec()
}

/// Regular files directly inside `dir` (subdirectories are not descended into).
pub fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
                .count()
        })
        .unwrap_or(0)
}
