//! # Runtime Configuration Module
//!
//! Environment-variable configuration for runtime behavior. Values are
//! parsed forgivingly: anything unreadable falls back to the default
//! rather than failing startup.
//!
//! ## Environment Variables
//!
//! ### `PORTICO_DEBUG`
//!
//! Truthy values (`1`, `true`, `yes`, `on`, any case) switch server-error
//! responses from the generic body to one carrying the underlying error
//! message. Leave unset in production.
//!
//! ### `PORTICO_BASE_PATH`
//!
//! Prefix stripped from incoming HTTP paths before matching, for gateways
//! that mount the function under a stage or custom base (e.g. `/v1`).
//! Normalized to a leading slash and no trailing slash.
//!
//! ### `PORTICO_LOG_PLAIN`
//!
//! Truthy values switch telemetry output from JSON lines to the compact
//! human-readable format. Useful when running locally.

use std::env;

fn truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// Include underlying error messages in 500 responses.
    pub debug: bool,
    /// Path prefix stripped before route matching.
    pub base_path: Option<String>,
    /// Emit human-readable log lines instead of JSON.
    pub log_plain: bool,
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let debug = env::var("PORTICO_DEBUG").map(|v| truthy(&v)).unwrap_or(false);
        let log_plain = env::var("PORTICO_LOG_PLAIN")
            .map(|v| truthy(&v))
            .unwrap_or(false);
        let base_path = env::var("PORTICO_BASE_PATH")
            .ok()
            .map(|v| normalize_base_path(&v))
            .filter(|v| !v.is_empty());
        RuntimeConfig {
            debug,
            base_path,
            log_plain,
        }
    }

    /// Strip the configured base path from an incoming path. Paths outside
    /// the base pass through untouched.
    #[must_use]
    pub fn strip_base(&self, path: &str) -> String {
        let Some(base) = &self.base_path else {
            return path.to_string();
        };
        match path.strip_prefix(base.as_str()) {
            Some("") => "/".to_string(),
            Some(rest) if rest.starts_with('/') => rest.to_string(),
            _ => path.to_string(),
        }
    }
}

fn normalize_base_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() || trimmed == "/" {
        return String::new();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthy_words() {
        assert!(truthy("1"));
        assert!(truthy("TRUE"));
        assert!(truthy(" yes "));
        assert!(!truthy("0"));
        assert!(!truthy("nope"));
    }

    #[test]
    fn test_normalize_base_path() {
        assert_eq!(normalize_base_path("v1/"), "/v1");
        assert_eq!(normalize_base_path("/v1"), "/v1");
        assert_eq!(normalize_base_path("/"), "");
    }

    #[test]
    fn test_strip_base() {
        let config = RuntimeConfig {
            base_path: Some("/v1".to_string()),
            ..RuntimeConfig::default()
        };
        assert_eq!(config.strip_base("/v1/pets"), "/pets");
        assert_eq!(config.strip_base("/v1"), "/");
        assert_eq!(config.strip_base("/v2/pets"), "/v2/pets");
        // A segment merely starting with the base is not inside it.
        assert_eq!(config.strip_base("/v1x/pets"), "/v1x/pets");
    }
}
