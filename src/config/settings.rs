use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{AzkvError, Result};
use crate::vault::policy::{DEFAULT_LOGIN_VALIDITY_HOURS, DEFAULT_STORE_FRESHNESS_HOURS};
use crate::vault::secret::DEFAULT_EXPIRY_WARNING_DAYS;
use crate::vault::ReauthPolicy;

/// Upper bound for the login and freshness windows (ten years).
const MAX_WINDOW_HOURS: i64 = 24 * 365 * 10;

/// Upper bound for the expiry warning window (ten years).
const MAX_EXPIRY_WARNING_DAYS: i64 = 365 * 10;

/// Name of the per-user config directory under `$HOME`.
const CONFIG_DIR_NAME: &str = ".azkv";

/// User-level configuration, loaded from `<config_dir>/config.toml`.
///
/// Every field has a sensible default so azkv works out-of-the-box
/// without any config file at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    /// How long a cached login stays valid (default: 6 hours).
    #[serde(default = "default_login_validity_hours")]
    pub login_validity_hours: i64,

    /// Maximum age of the settings file before every vault must log in
    /// again (default: 24 hours).
    #[serde(default = "default_settings_freshness_hours")]
    pub settings_freshness_hours: i64,

    /// Secrets expiring within this many days are flagged (default: 15).
    #[serde(default = "default_expiry_warning_days")]
    pub expiry_warning_days: i64,

    /// File name of the vault settings store inside the config directory.
    #[serde(default = "default_settings_file")]
    pub settings_file: String,

    /// Azure tenant to log in to. Uses the account default when unset.
    #[serde(default)]
    pub tenant_id: Option<String>,

    /// HTTP timeout for Key Vault requests, in seconds (default: 30).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_login_validity_hours() -> i64 {
    DEFAULT_LOGIN_VALIDITY_HOURS
}

fn default_settings_freshness_hours() -> i64 {
    DEFAULT_STORE_FRESHNESS_HOURS
}

fn default_expiry_warning_days() -> i64 {
    DEFAULT_EXPIRY_WARNING_DAYS
}

fn default_settings_file() -> String {
    "settings.json".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            login_validity_hours: default_login_validity_hours(),
            settings_freshness_hours: default_settings_freshness_hours(),
            expiry_warning_days: default_expiry_warning_days(),
            settings_file: default_settings_file(),
            tenant_id: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl AppSettings {
    /// Name of the config file we look for in the config directory.
    const FILE_NAME: &'static str = "config.toml";

    /// Load settings from `<config_dir>/config.toml`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: AppSettings = toml::from_str(&contents).map_err(|e| {
            AzkvError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.login_validity_hours <= 0 || self.settings_freshness_hours <= 0 {
            return Err(AzkvError::ConfigError(
                "login_validity_hours and settings_freshness_hours must be positive".into(),
            ));
        }
        if self.login_validity_hours > MAX_WINDOW_HOURS
            || self.settings_freshness_hours > MAX_WINDOW_HOURS
        {
            return Err(AzkvError::ConfigError(format!(
                "login_validity_hours and settings_freshness_hours cannot exceed {MAX_WINDOW_HOURS}"
            )));
        }
        if !(0..=MAX_EXPIRY_WARNING_DAYS).contains(&self.expiry_warning_days) {
            return Err(AzkvError::ConfigError(format!(
                "expiry_warning_days must be between 0 and {MAX_EXPIRY_WARNING_DAYS}"
            )));
        }
        if self.settings_file.trim().is_empty() || self.settings_file.contains(['/', '\\']) {
            return Err(AzkvError::ConfigError(format!(
                "settings_file '{}' must be a plain file name",
                self.settings_file
            )));
        }
        Ok(())
    }

    /// Full path of the vault settings store.
    ///
    /// Example: `~/.azkv/settings.json`
    pub fn settings_path(&self, config_dir: &Path) -> PathBuf {
        config_dir.join(&self.settings_file)
    }

    pub fn reauth_policy(&self) -> ReauthPolicy {
        ReauthPolicy::from_hours(self.login_validity_hours, self.settings_freshness_hours)
    }

    pub fn expiry_window(&self) -> chrono::Duration {
        chrono::Duration::try_days(self.expiry_warning_days).unwrap_or(chrono::Duration::MAX)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Resolve the config directory: an explicit path wins, then `~/.azkv`.
pub fn resolve_config_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR_NAME))
        .ok_or_else(|| {
            AzkvError::ConfigError(
                "could not determine home directory, pass --config-dir or set AZKV_HOME".into(),
            )
        })
}

// ── Tests ────────────────────────────────────────────────────────────
