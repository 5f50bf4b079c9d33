//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_head_bytes` is 0 or exceeds 16MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `max_redirects` exceeds 20
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_head_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "max_head_bytes".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.max_head_bytes > 16 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_head_bytes".into(), reason: "must not exceed 16MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.max_redirects > 20 {
            return Err(ConfigError::Invalid { field: "max_redirects".into(), reason: "must not exceed 20".into() });
        }

        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if !self.allowlist_domains.is_empty() && !self.denylist_domains.is_empty() {
            tracing::warn!(
                allowlist_count = self.allowlist_domains.len(),
                denylist_count = self.denylist_domains.len(),
                "Both allowlist_domains and denylist_domains are set; \
                 allowlist takes precedence"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_max_head_bytes_zero() {
        let config = AppConfig { max_head_bytes: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_head_bytes"));
    }

    #[test]
    fn test_validate_max_head_bytes_exceeds_limit() {
        let config = AppConfig { max_head_bytes: 17 * 1024 * 1024, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_head_bytes"));
    }

    #[test]
    fn test_validate_timeout_too_small() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_timeout_exceeds_limit() {
        let config = AppConfig { timeout_ms: 301_000, ..Default::default() }; // 5min 1sec
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_too_many_redirects() {
        let config = AppConfig { max_redirects: 21, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_redirects"));
    }

    #[test]
    fn test_validate_empty_user_agent() {
        let config = AppConfig { user_agent: "  ".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "user_agent"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig { max_head_bytes: 1, timeout_ms: 100, max_redirects: 0, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_max_values() {
        let config =
            AppConfig { max_head_bytes: 16 * 1024 * 1024, timeout_ms: 300_000, max_redirects: 20, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_both_domain_lists_is_allowed() {
        let config = AppConfig {
            allowlist_domains: vec!["example.com".into()],
            denylist_domains: vec!["evil.test".into()],
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
