use serde::Deserialize;

use crate::utils::constants::{
    DEFAULT_HTTP_TIMEOUT_MS, DEFAULT_METRICS_PATH, DEFAULT_REAUTH_ATTEMPTS, DEFAULT_SERVER_HOST,
    DEFAULT_SERVER_PORT,
};

/// ================================
/// Global service-wide settings
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct SettingsConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    pub logging: Option<LoggingConfig>,
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
    #[serde(default)]
    pub reauth: ReauthConfig,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            metrics: MetricsConfig::default(),
            logging: None,
            http_timeout_ms: DEFAULT_HTTP_TIMEOUT_MS,
            reauth: ReauthConfig::default(),
        }
    }
}

/// How many times an expired token may be refreshed for a single catalog
/// fetch or sampling pass.
#[derive(Debug, Deserialize, Clone)]
pub struct ReauthConfig {
    /// `0` disables the cap: refresh for as long as the provider keeps
    /// answering 401.
    #[serde(default = "default_reauth_attempts")]
    pub max_attempts: u32,
}

impl Default for ReauthConfig {
    fn default() -> Self {
        Self { max_attempts: DEFAULT_REAUTH_ATTEMPTS }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { path: default_metrics_path() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_server_host(), port: DEFAULT_SERVER_PORT }
    }
}

/// ================================
/// Logging
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String, // allowed: trace, debug, info, warn, error
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn new(level: String, format: LogFormat) -> Self {
        Self { level, format }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Compact,
}

fn default_metrics_path() -> String {
    DEFAULT_METRICS_PATH.to_string()
}

fn default_server_host() -> String {
    DEFAULT_SERVER_HOST.to_string()
}

fn default_server_port() -> u16 {
    DEFAULT_SERVER_PORT
}

fn default_http_timeout_ms() -> u64 {
    DEFAULT_HTTP_TIMEOUT_MS
}

fn default_reauth_attempts() -> u32 {
    DEFAULT_REAUTH_ATTEMPTS
}
