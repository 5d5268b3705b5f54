//! Reconciler configuration
//!
//! Config file: `--config <path>`, else ~/.config/darkxp/config.toml, else
//! /etc/darkxp/config.toml. Environment variables (optionally loaded from a
//! dotenv file first) override file values.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ReconcileError, Result};

/// Env vars checked for the store URL, first match wins
pub const URL_ENV_VARS: &[&str] = &["NEXT_PUBLIC_SUPABASE_URL", "SUPABASE_URL"];

pub const SERVICE_KEY_ENV: &str = "SUPABASE_SERVICE_ROLE_KEY";
pub const TIMEOUT_ENV: &str = "DARKXP_TIMEOUT_SECS";

/// Dotenv file loaded when none is given
pub const DEFAULT_ENV_FILE: &str = ".env.local";

/// Color display mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Color when stdout is a terminal
    Auto,
    Always,
    Never,
}

impl Default for ColorMode {
    fn default() -> Self {
        Self::Auto
    }
}

/// Hosted store connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Project URL, e.g. https://xyz.supabase.co
    #[serde(default)]
    pub url: Option<String>,

    /// Service-role key (bypasses row level security)
    #[serde(default)]
    pub service_key: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Rows per read request
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Rows per insert request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_page_size() -> usize {
    1000
}

fn default_batch_size() -> usize {
    500
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            service_key: None,
            timeout_secs: default_timeout_secs(),
            page_size: default_page_size(),
            batch_size: default_batch_size(),
        }
    }
}

impl StoreConfig {
    /// Check the connection settings before any request goes out
    pub fn validate(&self) -> Result<()> {
        let url = self.url.as_deref().map(str::trim).unwrap_or_default();
        if url.is_empty() {
            return Err(ReconcileError::Config(format!(
                "Missing store URL. Set {} or [store].url",
                URL_ENV_VARS[0]
            )));
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ReconcileError::Config(format!(
                "Store URL must start with http:// or https://, got '{}'",
                url
            )));
        }
        if self.service_key.as_deref().map(str::trim).unwrap_or_default().is_empty() {
            return Err(ReconcileError::Config(format!(
                "Missing service key. Set {} or [store].service_key",
                SERVICE_KEY_ENV
            )));
        }
        if self.page_size == 0 || self.batch_size == 0 {
            return Err(ReconcileError::Config(
                "page_size and batch_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// REST root, without a trailing slash
    pub fn rest_url(&self) -> String {
        let base = self.url.as_deref().unwrap_or_default().trim().trim_end_matches('/');
        format!("{}/rest/v1", base)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub color: ColorMode,
}

/// Main reconciler configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub report: ReportConfig,
}

impl ReconcileConfig {
    /// Default user config path: ~/.config/darkxp/config.toml
    pub fn user_config_path() -> Option<PathBuf> {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            return Some(Path::new(&xdg).join("darkxp").join("config.toml"));
        }
        std::env::var("HOME")
            .ok()
            .map(|home| Path::new(&home).join(".config").join("darkxp").join("config.toml"))
    }

    /// System config path: /etc/darkxp/config.toml
    pub fn system_config_path() -> PathBuf {
        PathBuf::from("/etc/darkxp/config.toml")
    }

    /// Parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            ReconcileError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&contents).map_err(|e| {
            ReconcileError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Load configuration from file
    ///
    /// Priority:
    /// 1. Explicit path (must exist)
    /// 2. User config (~/.config/darkxp/config.toml)
    /// 3. System config (/etc/darkxp/config.toml)
    /// 4. Defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        if let Some(user_path) = Self::user_config_path() {
            if user_path.exists() {
                tracing::debug!("Loading config from {}", user_path.display());
                return Self::from_file(&user_path);
            }
        }

        let system_path = Self::system_config_path();
        if system_path.exists() {
            tracing::debug!("Loading config from {}", system_path.display());
            return Self::from_file(&system_path);
        }

        Ok(Self::default())
    }

    /// Override file values from the environment
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = URL_ENV_VARS.iter().find_map(|name| lookup(*name)) {
            self.store.url = Some(url);
        }
        if let Some(key) = lookup(SERVICE_KEY_ENV) {
            self.store.service_key = Some(key);
        }
        if let Some(raw) = lookup(TIMEOUT_ENV) {
            self.store.timeout_secs = raw.trim().parse().map_err(|_| {
                ReconcileError::Config(format!("{} must be a whole number, got '{}'", TIMEOUT_ENV, raw))
            })?;
        }
        Ok(())
    }

    /// Config file, then dotenv file, then process environment
    pub fn resolve(config_path: Option<&Path>, env_file: Option<&Path>) -> Result<Self> {
        load_env_file(env_file)?;
        let mut config = Self::load(config_path)?;
        config.apply_env(|name| std::env::var(name).ok().filter(|v| !v.trim().is_empty()))?;
        Ok(config)
    }
}

/// Load a dotenv file into the process environment.
///
/// The default file is optional; an explicitly named one must exist.
/// Variables already set in the environment are kept.
pub fn load_env_file(path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => dotenvy::from_path(path).map_err(|e| {
            ReconcileError::Config(format!("Failed to load {}: {}", path.display(), e))
        }),
        None => {
            if dotenvy::from_filename(DEFAULT_ENV_FILE).is_ok() {
                tracing::debug!("Loaded environment from {}", DEFAULT_ENV_FILE);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ReconcileConfig::default();
        assert_eq!(config.store.timeout_secs, 30);
        assert_eq!(config.store.page_size, 1000);
        assert_eq!(config.store.batch_size, 500);
        assert_eq!(config.report.color, ColorMode::Auto);
        assert!(config.store.validate().is_err());
    }

    #[test]
    fn test_file_then_env_override() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[store]
url = "https://file.example.co"
service_key = "file-key"
batch_size = 50

[report]
color = "never"
"#,
        )
        .unwrap();

        let mut config = ReconcileConfig::load(Some(&path)).unwrap();
        assert_eq!(config.store.batch_size, 50);
        assert_eq!(config.report.color, ColorMode::Never);

        config
            .apply_env(env(&[
                ("SUPABASE_URL", "https://env.example.co/"),
                (SERVICE_KEY_ENV, "env-key"),
            ]))
            .unwrap();
        assert_eq!(config.store.url.as_deref(), Some("https://env.example.co/"));
        assert_eq!(config.store.service_key.as_deref(), Some("env-key"));
        assert_eq!(config.store.rest_url(), "https://env.example.co/rest/v1");
        assert!(config.store.validate().is_ok());
    }

    #[test]
    fn test_public_url_var_wins() {
        let mut config = ReconcileConfig::default();
        config
            .apply_env(env(&[
                ("NEXT_PUBLIC_SUPABASE_URL", "https://a.example.co"),
                ("SUPABASE_URL", "https://b.example.co"),
            ]))
            .unwrap();
        assert_eq!(config.store.url.as_deref(), Some("https://a.example.co"));
    }

    #[test]
    fn test_invalid_timeout_is_config_error() {
        let mut config = ReconcileConfig::default();
        let err = config.apply_env(env(&[(TIMEOUT_ENV, "soon")])).unwrap_err();
        assert!(matches!(err, ReconcileError::Config(_)));
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(ReconcileConfig::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut config = ReconcileConfig::default();
        config.store.url = Some("ftp://example".to_string());
        config.store.service_key = Some("key".to_string());
        assert!(config.store.validate().is_err());
    }
}
