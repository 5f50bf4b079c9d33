//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (LINKPEEK_*)
//! 2. TOML config file (if LINKPEEK_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Desktop browser user agent.
///
/// Some sites serve stripped-down mobile pages without social card tags to
/// unknown or mobile agents.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (LINKPEEK_*)
/// 2. TOML config file (if LINKPEEK_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite preview cache database.
    ///
    /// Set via LINKPEEK_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via LINKPEEK_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum body bytes read while looking for `</head>`.
    ///
    /// Set via LINKPEEK_MAX_HEAD_BYTES environment variable.
    #[serde(default = "default_max_head_bytes")]
    pub max_head_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via LINKPEEK_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum number of redirects to follow.
    ///
    /// Set via LINKPEEK_MAX_REDIRECTS environment variable.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// How long a cached preview stays fresh, in seconds. Zero disables caching.
    ///
    /// Set via LINKPEEK_CACHE_TTL_SECS environment variable.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Refuse to fetch hosts resolving to private or reserved addresses.
    ///
    /// Set via LINKPEEK_BLOCK_PRIVATE_ADDRESSES environment variable.
    #[serde(default = "default_true")]
    pub block_private_addresses: bool,

    /// Suppress previews that resolved no title.
    ///
    /// Set via LINKPEEK_REQUIRE_TITLE environment variable.
    #[serde(default = "default_true")]
    pub require_title: bool,

    /// Domain allowlist for fetch operations.
    ///
    /// Set via LINKPEEK_ALLOWLIST_DOMAINS environment variable (e.g. `[a.com, b.org]`).
    #[serde(default)]
    pub allowlist_domains: Vec<String>,

    /// Domain denylist for fetch operations.
    ///
    /// Set via LINKPEEK_DENYLIST_DOMAINS environment variable (e.g. `[a.com, b.org]`).
    #[serde(default)]
    pub denylist_domains: Vec<String>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./linkpeek-cache.sqlite")
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.into()
}

fn default_max_head_bytes() -> usize {
    1_048_576 // 1MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_redirects() -> usize {
    5
}

fn default_cache_ttl_secs() -> u64 {
    86_400
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_head_bytes: default_max_head_bytes(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
            cache_ttl_secs: default_cache_ttl_secs(),
            block_private_addresses: true,
            require_title: true,
            allowlist_domains: Vec::new(),
            denylist_domains: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Cache TTL, or `None` when caching is disabled.
    pub fn cache_ttl(&self) -> Option<Duration> {
        (self.cache_ttl_secs > 0).then(|| Duration::from_secs(self.cache_ttl_secs))
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `LINKPEEK_`
    /// 2. TOML file from `LINKPEEK_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("LINKPEEK_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("LINKPEEK_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./linkpeek-cache.sqlite"));
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.max_head_bytes, 1_048_576);
        assert_eq!(config.timeout_ms, 20_000);
        assert_eq!(config.max_redirects, 5);
        assert_eq!(config.cache_ttl_secs, 86_400);
        assert!(config.block_private_addresses);
        assert!(config.require_title);
        assert!(config.allowlist_domains.is_empty());
        assert!(config.denylist_domains.is_empty());
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_cache_ttl_disabled_at_zero() {
        let config = AppConfig { cache_ttl_secs: 0, ..Default::default() };
        assert!(config.cache_ttl().is_none());

        let config = AppConfig::default();
        assert_eq!(config.cache_ttl(), Some(Duration::from_secs(86_400)));
    }

    #[test]
    fn test_user_agent_is_desktop_browser() {
        assert!(DEFAULT_USER_AGENT.starts_with("Mozilla/5.0"));
        assert!(!DEFAULT_USER_AGENT.contains("Mobile"));
    }
}
