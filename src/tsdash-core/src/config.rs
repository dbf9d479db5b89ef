use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Marks the connection cookie `Secure`
    #[serde(default)]
    pub production: bool,

    /// Which backend is authoritative for the active connection
    #[serde(default)]
    pub connection_store: StoreBackend,

    /// Built dashboard UI, served when the directory exists
    #[serde(default = "default_static_dir")]
    pub static_dir: String,

    // Upstream request policy
    #[serde(default)]
    pub request: RequestConfig,

    // CORS configuration
    #[serde(default)]
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Per-browser http-only cookie
    #[default]
    Cookie,
    /// Key-value file in `data_dir`, shared by every browser
    File,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequestConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_timeout_secs() -> u64 {
    10 // Same budget the connection test uses
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    200
}

impl RequestConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
    #[serde(default = "default_cors_enabled")]
    pub enabled: bool,
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_cors_enabled() -> bool {
    true
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()]
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: default_cors_enabled(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_port() -> String {
    "3000".to_string()
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_static_dir() -> String {
    "./static".to_string()
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            data_dir: default_data_dir(),
            production: false,
            connection_store: StoreBackend::default(),
            static_dir: default_static_dir(),
            request: RequestConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"connection_store": "file", "request": {"max_retries": 0}}"#)
                .unwrap();
        assert_eq!(config.connection_store, StoreBackend::File);
        assert_eq!(config.request.max_retries, 0);
        assert_eq!(config.request.timeout(), Duration::from_secs(10));
        assert_eq!(config.port, "3000");
        assert!(config.cors.enabled);
    }

    #[test]
    fn test_load_missing_file_errors() {
        assert!(Config::load("/definitely/not/here/config.json").is_err());
    }
}
