//! Configuration types for the faultline service.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::net::SocketAddr;

use crate::FaultlineError;

// ============================================================================
// Default configuration constants
// ============================================================================

/// Default HTTP bind port for the ingestion and stats API.
pub const DEFAULT_HTTP_PORT: u16 = 8700;

/// Default maximum request body size (4 MiB).
///
/// Remote fault batches are small JSON payloads; anything larger than this
/// should be split by the reporting client.
pub const DEFAULT_MAX_BODY_SIZE: usize = 4 * 1024 * 1024;

/// Default critical-severity alert threshold (faults per hour bucket).
pub const DEFAULT_CRITICAL_THRESHOLD: u64 = 10;

/// Default error-severity alert threshold (faults per hour bucket).
pub const DEFAULT_ERROR_THRESHOLD: u64 = 100;

/// Default hour-bucket retention (7 days).
pub const DEFAULT_RETENTION_HOURS: u32 = 168;

/// Default stats window when the caller does not specify one.
pub const DEFAULT_STATS_HOURS: u32 = 24;

/// Faultline service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FaultlineConfig {
    /// Deployment posture: "development" or "production".
    ///
    /// Layer rule enforcement defaults to enabled only under "development".
    pub environment: Environment,
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Monitor thresholds and retention.
    pub monitor: MonitorConfig,
    /// Layer rule engine configuration.
    pub layers: LayerConfig,
}

impl FaultlineConfig {
    /// Load configuration from files and environment.
    ///
    /// Configuration is loaded in order (later sources override earlier):
    /// 1. Default values
    /// 2. `faultline.toml` in the current directory
    /// 3. Environment variables prefixed with `FAULTLINE_`, with `__`
    ///    separating nesting levels so multi-word keys stay intact, e.g.
    ///    `FAULTLINE_MONITOR__CRITICAL_THRESHOLD`
    pub fn load() -> Result<Self, FaultlineError> {
        Figment::new()
            .merge(Toml::file("faultline.toml"))
            .merge(Env::prefixed("FAULTLINE_").split("__"))
            .extract()
            .map_err(|e| FaultlineError::Config(e.to_string()))
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &str) -> Result<Self, FaultlineError> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("FAULTLINE_").split("__"))
            .extract()
            .map_err(|e| FaultlineError::Config(e.to_string()))
    }
}

/// Deployment posture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development: layer enforcement on by default.
    Development,
    /// Production: layer enforcement off unless explicitly enabled.
    #[default]
    Production,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the ingestion/stats API to (default: 0.0.0.0:8700).
    pub bind_addr: SocketAddr,
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_HTTP_PORT)),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

/// Monitor configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Critical faults per hour before an alert fires.
    pub critical_threshold: u64,
    /// Error faults per hour before an alert fires.
    pub error_threshold: u64,
    /// How many hours of buckets to retain before sweeping.
    pub retention_hours: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            critical_threshold: DEFAULT_CRITICAL_THRESHOLD,
            error_threshold: DEFAULT_ERROR_THRESHOLD,
            retention_hours: DEFAULT_RETENTION_HOURS,
        }
    }
}

/// Layer rule engine configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    /// Whether enforcement is active. Unset means "enabled in development,
    /// disabled in production".
    pub enabled: Option<bool>,
    /// Strict mode: violations fail fault admission instead of warning.
    pub strict: bool,
    /// Rule overrides. Empty means the built-in rule set.
    pub rules: Vec<LayerRuleConfig>,
}

/// One configured layer rule.
#[derive(Debug, Clone, Deserialize)]
pub struct LayerRuleConfig {
    /// Layer name recorded on matching faults (e.g. "api", "service").
    pub name: String,
    /// Substring matched against the normalised origin file path.
    pub pattern: String,
    /// Fault kind codes permitted to originate from this layer.
    pub allowed: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = FaultlineConfig::default();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.monitor.critical_threshold, 10);
        assert_eq!(config.monitor.error_threshold, 100);
        assert_eq!(config.monitor.retention_hours, 168);
        assert_eq!(config.server.bind_addr.port(), DEFAULT_HTTP_PORT);
        assert!(config.layers.enabled.is_none());
        assert!(!config.layers.strict);
        assert!(config.layers.rules.is_empty());
    }

    #[test]
    fn environment_parses_lowercase() {
        let env: Environment = serde_json::from_str("\"development\"").unwrap();
        assert_eq!(env, Environment::Development);
    }

    #[test]
    fn env_override_reaches_multi_word_keys() {
        std::env::set_var("FAULTLINE_MONITOR__CRITICAL_THRESHOLD", "7");
        std::env::set_var("FAULTLINE_SERVER__MAX_BODY_SIZE", "1024");
        let config = FaultlineConfig::load().unwrap();
        std::env::remove_var("FAULTLINE_MONITOR__CRITICAL_THRESHOLD");
        std::env::remove_var("FAULTLINE_SERVER__MAX_BODY_SIZE");

        assert_eq!(config.monitor.critical_threshold, 7);
        assert_eq!(config.server.max_body_size, 1024);
    }
}
