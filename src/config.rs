use config::{Config, Environment, File};
use serde::Deserialize;

use crate::cache::{DEFAULT_CAPACITY, DEFAULT_TTL_SECS};
use crate::provider::gemini::DEFAULT_BASE_URL;
use crate::router::DEFAULT_MODELS;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeminiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key. Read on every
    /// request, never at startup.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Candidate models in preference order.
    #[serde(default = "default_models")]
    pub models: Vec<String>,
    /// Unset means upstream calls are never cut short.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            models: default_models(),
            timeout_secs: None,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_models() -> Vec<String> {
    DEFAULT_MODELS.iter().map(|m| m.to_string()).collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
            capacity: default_cache_capacity(),
        }
    }
}

fn default_cache_ttl() -> u64 {
    DEFAULT_TTL_SECS // 30 minutes
}

fn default_cache_capacity() -> usize {
    DEFAULT_CAPACITY
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    #[serde(default = "default_retry_after")]
    pub retry_after_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            retry_after_secs: default_retry_after(),
        }
    }
}

fn default_retry_after() -> u64 {
    20
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.gemini.models.iter().all(|m| m.trim().is_empty()) {
            return Err("gemini.models must name at least one model".to_string());
        }
        if self.gemini.api_key_env.trim().is_empty() {
            return Err("gemini.api_key_env must name an environment variable".to_string());
        }
        if self.cache.capacity == 0 {
            return Err("cache.capacity must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn load(config_path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder();

        let path = config_path.unwrap_or("config.toml");
        builder = builder.add_source(File::with_name(path).required(false));

        // SAJU__SERVER__PORT=8080, SAJU__GEMINI__TIMEOUT_SECS=30, ...
        builder = builder.add_source(
            Environment::with_prefix("SAJU")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
