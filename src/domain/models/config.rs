use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure for silt
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// HTTP client and worker pool configuration
    #[serde(default)]
    pub http: HttpConfig,

    /// Request budget configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Token refresh configuration
    #[serde(default)]
    pub token: TokenConfig,

    /// Settings consumed by collectors and their collaborators
    #[serde(default)]
    pub collector: CollectorConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".silt/silt.db".to_string()
}

const fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Console (stderr) format
    #[serde(default)]
    pub format: LogFormat,

    /// Directory for rolling JSON log files; console only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Rotation of the log file
    #[serde(default)]
    pub rotation: RotationPolicy,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    Never,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            log_dir: None,
            rotation: RotationPolicy::default(),
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries of transient failures (transport, 429, 5xx)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Concurrent in-flight requests per collection run
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

const fn default_timeout_secs() -> u64 {
    120
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    1_000
}

const fn default_max_backoff_ms() -> u64 {
    60_000
}

const fn default_concurrency() -> usize {
    10
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            concurrency: default_concurrency(),
        }
    }
}

/// Request budget configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitConfig {
    /// Budget used until a response carries a quota header
    #[serde(default = "default_requests_per_hour")]
    pub requests_per_hour: u32,

    /// Per-credential quota header, e.g. `X-RateLimit-Limit`
    #[serde(default = "default_quota_header")]
    pub quota_header: String,

    /// Window the quota header refers to, in seconds
    #[serde(default = "default_quota_window_secs")]
    pub quota_window_secs: u64,
}

const fn default_requests_per_hour() -> u32 {
    18_000
}

fn default_quota_header() -> String {
    "X-RateLimit-Limit".to_string()
}

const fn default_quota_window_secs() -> u64 {
    3_600
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_hour: default_requests_per_hour(),
            quota_header: default_quota_header(),
            quota_window_secs: default_quota_window_secs(),
        }
    }
}

/// Token refresh configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TokenConfig {
    /// Refresh this many minutes before the access token expires
    #[serde(default = "default_refresh_buffer_minutes")]
    pub refresh_buffer_minutes: u32,
}

const fn default_refresh_buffer_minutes() -> u32 {
    5
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            refresh_buffer_minutes: default_refresh_buffer_minutes(),
        }
    }
}

impl TokenConfig {
    pub fn refresh_buffer(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.refresh_buffer_minutes))
    }
}

/// Settings read by collectors and the extract/convert collaborators
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CollectorConfig {
    /// Usernames (bots, service accounts) whose records are not collected
    #[serde(default)]
    pub excluded_usernames: Vec<String>,
}

impl CollectorConfig {
    /// Case-insensitive membership test against the exclude list.
    pub fn is_excluded_user(&self, username: &str) -> bool {
        let username = username.trim();
        self.excluded_usernames
            .iter()
            .any(|excluded| excluded.trim().eq_ignore_ascii_case(username))
    }
}
