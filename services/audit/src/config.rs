//! services/audit/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use site_audit_core::{OrchestratorSettings, ScanTarget};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub ajax_url: String,
    /// Opaque anti-forgery token attached to every call.
    pub ajax_nonce: Option<String>,
    pub scan_target: ScanTarget,
    pub per_page: u32,
    pub batch_delay: Duration,
    pub completion_delay: Duration,
    pub batch_timeout: Option<Duration>,
    pub search_debounce: Duration,
    pub assume_yes: bool,
    pub log_level: Level,
    pub bind_address: SocketAddr,
    pub sandbox_pages: u64,
    pub sandbox_batch_size: u64,
    pub cors_origin: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Client Settings ---
        let ajax_url = lookup("AJAX_URL")
            .unwrap_or_else(|| "http://127.0.0.1:3000/wp-admin/admin-ajax.php".to_string());
        if !ajax_url.starts_with("http://") && !ajax_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "AJAX_URL".to_string(),
                format!("'{}' is not an http(s) URL", ajax_url),
            ));
        }
        let ajax_nonce = lookup("AJAX_NONCE").filter(|n| !n.trim().is_empty());

        let scan_target = match lookup("SCAN_TARGET") {
            Some(raw) => raw
                .parse::<ScanTarget>()
                .map_err(|e| ConfigError::InvalidValue("SCAN_TARGET".to_string(), e))?,
            None => ScanTarget::BrokenLinks,
        };

        let per_page = parse_or(&lookup, "RESULTS_PER_PAGE", 20u32)?;
        if per_page == 0 {
            return Err(ConfigError::InvalidValue(
                "RESULTS_PER_PAGE".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        // --- Pacing ---
        let batch_delay = Duration::from_millis(parse_or(&lookup, "BATCH_DELAY_MS", 500u64)?);
        let completion_delay =
            Duration::from_millis(parse_or(&lookup, "COMPLETION_DELAY_MS", 1500u64)?);
        let batch_timeout = match parse_or(&lookup, "BATCH_TIMEOUT_SECS", 60u64)? {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let search_debounce =
            Duration::from_millis(parse_or(&lookup, "SEARCH_DEBOUNCE_MS", 300u64)?);
        let assume_yes = parse_or(&lookup, "ASSUME_YES", false)?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Sandbox Server Settings ---
        let bind_address_str =
            lookup("BIND_ADDRESS").unwrap_or_else(|| "127.0.0.1:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;
        let sandbox_pages = parse_or(&lookup, "SANDBOX_PAGES", 40u64)?;
        let sandbox_batch_size = parse_or(&lookup, "SANDBOX_BATCH_SIZE", 10u64)?.max(1);
        let cors_origin = lookup("CORS_ORIGIN").filter(|o| !o.trim().is_empty());

        Ok(Self {
            ajax_url,
            ajax_nonce,
            scan_target,
            per_page,
            batch_delay,
            completion_delay,
            batch_timeout,
            search_debounce,
            assume_yes,
            log_level,
            bind_address,
            sandbox_pages,
            sandbox_batch_size,
            cors_origin,
        })
    }

    /// The orchestrator's pacing and paging settings.
    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            batch_delay: self.batch_delay,
            completion_delay: self.completion_delay,
            batch_timeout: self.batch_timeout,
            search_debounce: self.search_debounce,
            per_page: self.per_page,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.scan_target, ScanTarget::BrokenLinks);
        assert_eq!(config.per_page, 20);
        assert_eq!(config.batch_delay, Duration::from_millis(500));
        assert_eq!(config.completion_delay, Duration::from_millis(1500));
        assert_eq!(config.batch_timeout, Some(Duration::from_secs(60)));
        assert_eq!(config.ajax_nonce, None);
        assert!(!config.assume_yes);
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("SCAN_TARGET", "images"),
            ("AJAX_NONCE", "abc123"),
            ("RESULTS_PER_PAGE", "25"),
            ("BATCH_TIMEOUT_SECS", "0"),
            ("ASSUME_YES", "true"),
            ("RUST_LOG", "debug"),
        ])
        .unwrap();
        assert_eq!(config.scan_target, ScanTarget::ImageAlt);
        assert_eq!(config.ajax_nonce.as_deref(), Some("abc123"));
        assert_eq!(config.orchestrator_settings().per_page, 25);
        assert_eq!(config.batch_timeout, None);
        assert!(config.assume_yes);
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    fn test_invalid_values_are_reported_by_name() {
        match config_from(&[("RESULTS_PER_PAGE", "lots")]) {
            Err(ConfigError::InvalidValue(key, _)) => assert_eq!(key, "RESULTS_PER_PAGE"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(config_from(&[("RESULTS_PER_PAGE", "0")]).is_err());
        assert!(config_from(&[("SCAN_TARGET", "videos")]).is_err());
        assert!(config_from(&[("AJAX_URL", "ftp://example.com")]).is_err());
        assert!(config_from(&[("BIND_ADDRESS", "nowhere")]).is_err());
    }
}
