use std::env;
use std::path::PathBuf;

/// Deployment mode; switches the data directory and SQLite durability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Development,
    Production,
}

impl RunMode {
    fn from_env_value(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "production" | "prod" => RunMode::Production,
            _ => RunMode::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, RunMode::Production)
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mode: RunMode,

    /// Directory holding the SQLite database (default: ./data)
    pub data_dir: PathBuf,

    /// SQLite connection URL (default: sqlite://{data_dir}/cases.db)
    pub database_url: String,

    /// Root directory for uploaded content (default: ./uploads)
    pub upload_dir: PathBuf,

    /// Maximum file size in bytes (default: 5 MiB)
    pub max_file_size: usize,

    /// Maximum images, and separately documents, attached to one case (default: 10)
    pub max_files_per_case: u64,

    /// Rate limit: requests per window per client address (default: 100)
    pub rate_limit_max_requests: u32,

    /// Rate limit window in seconds (default: 15 minutes)
    pub rate_limit_window_secs: u64,

    /// Session lifetime in hours (default: 24)
    pub session_ttl_hours: i64,

    /// SQLite busy timeout in seconds (default: 5)
    pub db_busy_timeout_secs: u64,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,
}

const DEV_DATA_DIR: &str = "./data";
const PROD_DATA_DIR: &str = "/var/lib/osint-cases";

fn sqlite_url(data_dir: &std::path::Path) -> String {
    format!("sqlite://{}/cases.db", data_dir.display())
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = PathBuf::from(DEV_DATA_DIR);
        Self {
            mode: RunMode::Development,
            database_url: sqlite_url(&data_dir),
            data_dir,
            upload_dir: PathBuf::from("./uploads"),
            max_file_size: 5 * 1024 * 1024, // 5 MiB
            max_files_per_case: 10,
            rate_limit_max_requests: 100,
            rate_limit_window_secs: 15 * 60,
            session_ttl_hours: 24,
            db_busy_timeout_secs: 5,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(), // Vite default
                "http://127.0.0.1:5173".to_string(),
            ],
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mode = env::var("APP_ENV")
            .map(|v| RunMode::from_env_value(&v))
            .unwrap_or(RunMode::Development);

        let default = match mode {
            RunMode::Production => Self::production(),
            RunMode::Development => Self::development(),
        };

        let data_dir = env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(default.data_dir);

        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| sqlite_url(&data_dir));

        Self {
            mode,
            data_dir,
            database_url,

            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.upload_dir),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            max_files_per_case: env::var("MAX_FILES_PER_CASE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_files_per_case),

            rate_limit_max_requests: env::var("RATE_LIMIT_MAX_REQUESTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.rate_limit_max_requests),

            rate_limit_window_secs: env::var("RATE_LIMIT_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.rate_limit_window_secs),

            session_ttl_hours: env::var("SESSION_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.session_ttl_hours),

            db_busy_timeout_secs: env::var("DB_BUSY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.db_busy_timeout_secs),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Create config for development (local data directory, relaxed durability)
    pub fn development() -> Self {
        Self::default()
    }

    /// Create config for production (system data directory, full durability)
    pub fn production() -> Self {
        let data_dir = PathBuf::from(PROD_DATA_DIR);
        Self {
            mode: RunMode::Production,
            database_url: sqlite_url(&data_dir),
            data_dir,
            ..Self::default()
        }
    }

    /// Directory holding derived image thumbnails
    pub fn thumbnail_dir(&self) -> PathBuf {
        self.upload_dir
            .join(crate::services::upload_service::THUMBNAIL_DIR)
    }

    /// Directory holding legacy per-case cover images
    pub fn case_image_dir(&self) -> PathBuf {
        self.upload_dir
            .join(crate::services::upload_service::CASE_IMAGE_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.max_file_size, 5 * 1024 * 1024);
        assert_eq!(config.max_files_per_case, 10);
        assert_eq!(config.rate_limit_window_secs, 900);
        assert_eq!(config.mode, RunMode::Development);
        assert_eq!(config.database_url, "sqlite://./data/cases.db");
    }

    #[test]
    fn test_production_config() {
        let config = AppConfig::production();
        assert!(config.mode.is_production());
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/osint-cases"));
        assert_eq!(config.database_url, "sqlite:///var/lib/osint-cases/cases.db");
        assert_eq!(config.max_file_size, 5 * 1024 * 1024);
    }

    #[test]
    fn test_run_mode_parsing() {
        assert_eq!(RunMode::from_env_value("production"), RunMode::Production);
        assert_eq!(RunMode::from_env_value(" PROD "), RunMode::Production);
        assert_eq!(RunMode::from_env_value("development"), RunMode::Development);
        assert_eq!(RunMode::from_env_value("anything"), RunMode::Development);
    }

    #[test]
    fn test_upload_subdirectories() {
        let config = AppConfig::default();
        assert_eq!(config.thumbnail_dir(), PathBuf::from("./uploads/thumbnails"));
        assert_eq!(config.case_image_dir(), PathBuf::from("./uploads/cases"));
    }
}
