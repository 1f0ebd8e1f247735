//! Configuration file parser for ~/.config/catalog-admin/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted but logged, since they are usually typos.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::cache::DataGroupKey;
use crate::refresh::{duration_millis, PolicyConfigError, RefreshPolicyConfig};

/// Environment variable that overrides `api_token`.
pub const TOKEN_ENV_VAR: &str = "CATALOG_API_TOKEN";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid refresh settings: {0}")]
    Refresh(#[from] PolicyConfigError),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// Every field has a default, so any subset of keys can be given.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the admin API, e.g. `https://shop.example.com/api`.
    pub api_base_url: String,

    /// Bearer token. The `CATALOG_API_TOKEN` env var takes precedence.
    pub api_token: Option<String>,

    pub request_timeout_secs: u64,

    /// Maximum number of cached query results.
    pub cache_capacity: usize,

    /// Concurrent product-count requests when computing stats.
    pub stats_concurrency: usize,

    pub refresh: RefreshSettings,
}

/// The `[refresh]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RefreshSettings {
    pub stale_after_ms: u64,
    pub background_interval_ms: u64,
    pub refresh_only_when_stale: bool,
    pub background_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000/api".to_string(),
            api_token: None,
            request_timeout_secs: 20,
            cache_capacity: 256,
            stats_concurrency: 8,
            refresh: RefreshSettings::default(),
        }
    }
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            stale_after_ms: duration_millis(RefreshPolicyConfig::DEFAULT_STALE_AFTER),
            background_interval_ms: duration_millis(RefreshPolicyConfig::DEFAULT_BACKGROUND_INTERVAL),
            refresh_only_when_stale: false,
            background_enabled: false,
        }
    }
}

/// Mask the token in Debug output.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_base_url", &self.api_base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("cache_capacity", &self.cache_capacity)
            .field("stats_concurrency", &self.stats_concurrency)
            .field("refresh", &self.refresh)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 6] = [
        "api_base_url",
        "api_token",
        "request_timeout_secs",
        "cache_capacity",
        "stats_concurrency",
        "refresh",
    ];

    const KNOWN_REFRESH_KEYS: [&'static str; 4] = [
        "stale_after_ms",
        "background_interval_ms",
        "refresh_only_when_stale",
        "background_enabled",
    ];

    /// `$XDG_CONFIG_HOME/catalog-admin/config.toml`, falling back to
    /// `~/.config/catalog-admin/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
        Some(base.join("catalog-admin").join("config.toml"))
    }

    /// Load configuration from a TOML file.
    ///
    /// - Missing or empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Zero refresh durations → `Err(ConfigError::Refresh)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            warn_unknown_keys(&raw);
        }

        let config: Config = toml::from_str(&content)?;
        config.refresh_policy(Vec::<DataGroupKey>::new())?;
        tracing::info!(
            path = %path.display(),
            api_base_url = %config.api_base_url,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// The API token: `CATALOG_API_TOKEN` if set and non-empty, else `api_token`.
    pub fn api_token(&self) -> Option<SecretString> {
        std::env::var(TOKEN_ENV_VAR)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.api_token.clone().filter(|t| !t.trim().is_empty()))
            .map(SecretString::from)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Build the refresh policy settings for `data_groups` from the `[refresh]` table.
    pub fn refresh_policy(
        &self,
        data_groups: impl IntoIterator<Item = DataGroupKey>,
    ) -> Result<RefreshPolicyConfig, PolicyConfigError> {
        let config = RefreshPolicyConfig::new(data_groups)
            .stale_after(Duration::from_millis(self.refresh.stale_after_ms))
            .background_interval(Duration::from_millis(self.refresh.background_interval_ms))
            .refresh_only_when_stale(self.refresh.refresh_only_when_stale)
            .background_enabled(self.refresh.background_enabled);
        config.validate()?;
        Ok(config)
    }
}

fn warn_unknown_keys(raw: &toml::Table) {
    for key in raw.keys() {
        if !Config::KNOWN_KEYS.contains(&key.as_str()) {
            tracing::warn!(key = %key, "Unknown key in config file, ignoring");
        }
    }
    if let Some(toml::Value::Table(refresh)) = raw.get("refresh") {
        for key in refresh.keys() {
            if !Config::KNOWN_REFRESH_KEYS.contains(&key.as_str()) {
                tracing::warn!(key = %key, "Unknown key in [refresh] table, ignoring");
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_config(name: &str, content: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("catalog_admin_config_test_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api_base_url, "http://localhost:5000/api");
        assert!(config.api_token.is_none());
        assert_eq!(config.request_timeout_secs, 20);
        assert_eq!(config.cache_capacity, 256);
        assert_eq!(config.stats_concurrency, 8);
        assert_eq!(config.refresh.stale_after_ms, 300_000);
        assert_eq!(config.refresh.background_interval_ms, 1_800_000);
        assert!(!config.refresh.refresh_only_when_stale);
        assert!(!config.refresh.background_enabled);
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/catalog_admin_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.cache_capacity, 256);
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let (dir, path) = write_config("whitespace", "   \n  \n  ");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.request_timeout_secs, 20);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_refresh_table_uses_defaults_for_missing() {
        let (dir, path) = write_config("partial", "[refresh]\nbackground_enabled = true\n");

        let config = Config::load(&path).unwrap();
        assert!(config.refresh.background_enabled);
        assert_eq!(config.refresh.stale_after_ms, 300_000);
        assert_eq!(config.api_base_url, "http://localhost:5000/api");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let content = r#"
api_base_url = "https://shop.example.com/api"
api_token = "token-123"
request_timeout_secs = 5
cache_capacity = 64
stats_concurrency = 2

[refresh]
stale_after_ms = 60000
background_interval_ms = 120000
refresh_only_when_stale = true
background_enabled = true
"#;
        let (dir, path) = write_config("full", content);

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api_base_url, "https://shop.example.com/api");
        assert_eq!(config.api_token.as_deref(), Some("token-123"));
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.cache_capacity, 64);
        assert_eq!(config.stats_concurrency, 2);
        assert_eq!(
            config.refresh,
            RefreshSettings {
                stale_after_ms: 60_000,
                background_interval_ms: 120_000,
                refresh_only_when_stale: true,
                background_enabled: true,
            }
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_refresh_policy_built_from_settings() {
        let mut config = Config::default();
        config.refresh.stale_after_ms = 1_000;
        config.refresh.refresh_only_when_stale = true;

        let policy = config
            .refresh_policy([DataGroupKey::from("categories"), DataGroupKey::from("products")])
            .unwrap();
        assert_eq!(policy.stale_after, Duration::from_secs(1));
        assert_eq!(policy.background_interval, Duration::from_millis(1_800_000));
        assert!(policy.refresh_only_when_stale);
        assert_eq!(policy.data_groups.len(), 2);
    }

    #[test]
    fn test_zero_duration_rejected() {
        let (dir, path) = write_config("zero", "[refresh]\nstale_after_ms = 0\n");

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Refresh(PolicyConfigError::ZeroStaleAfter)));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (dir, path) = write_config("invalid", "this is not [valid toml");

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let content = r#"
api_base_url = "https://shop.example.com/api"
totally_fake_key = "should not fail"

[refresh]
stale_after = 5
"#;
        let (dir, path) = write_config("unknown", content);

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api_base_url, "https://shop.example.com/api");
        assert_eq!(config.refresh.stale_after_ms, 300_000);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let (dir, path) = write_config("wrongtype", "cache_capacity = \"lots\"\n");
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let (dir, path) = write_config("too_large", &"a".repeat(1_048_577));

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_debug_masks_api_token() {
        let config = Config {
            api_token: Some("super-secret-token-12345".to_string()),
            ..Config::default()
        };

        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("super-secret-token-12345"));
        assert!(debug_output.contains("[REDACTED]"));
    }

    #[test]
    fn test_debug_shows_none_when_no_token() {
        let debug_output = format!("{:?}", Config::default());
        assert!(debug_output.contains("api_token: None"));
        assert!(!debug_output.contains("[REDACTED]"));
    }
}
