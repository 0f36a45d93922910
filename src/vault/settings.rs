//! Per-vault settings as persisted in the settings file.
//!
//! JSON shape of one entry:
//!
//! ```text
//! {
//!   "vault_url": "https://kv-prod.vault.azure.net",
//!   "auth_record": "<opaque string or null>",
//!   "last_login_time": "<RFC 3339 timestamp or null>",
//!   "is_active": true
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::AuthRecord;
use crate::errors::{AzkvError, Result};

/// Configuration and cached login state for one vault.
///
/// `auth_record` and `last_login_time` are either both set or both unset;
/// only `record_login` sets them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VaultClientSettings {
    vault_url: String,

    #[serde(default)]
    auth_record: Option<String>,

    #[serde(default)]
    last_login_time: Option<DateTime<Utc>>,

    #[serde(default = "default_active")]
    is_active: bool,
}

fn default_active() -> bool {
    true
}

impl VaultClientSettings {
    /// Fresh settings for a vault that has never logged in.
    pub fn new(vault_url: &str) -> Result<Self> {
        Ok(Self {
            vault_url: normalize_vault_url(vault_url)?,
            auth_record: None,
            last_login_time: None,
            is_active: true,
        })
    }

    pub fn vault_url(&self) -> &str {
        &self.vault_url
    }

    pub fn auth_record(&self) -> Option<AuthRecord> {
        self.auth_record.clone().map(AuthRecord::from_serialized)
    }

    pub fn last_login_time(&self) -> Option<DateTime<Utc>> {
        self.last_login_time
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }

    /// `true` when a cached login exists.
    pub fn has_login(&self) -> bool {
        self.auth_record.is_some() && self.last_login_time.is_some()
    }

    /// Store the outcome of a fresh interactive login.
    pub fn record_login(&mut self, record: AuthRecord, at: DateTime<Utc>) {
        self.auth_record = Some(record.into_string());
        self.last_login_time = Some(at);
    }

    /// Drop the cached login so the next login is interactive.
    pub fn clear_login(&mut self) {
        self.auth_record = None;
        self.last_login_time = None;
    }

    /// Rewrite `vault_url` into its normalized form.
    pub(crate) fn normalize_url(&mut self) -> Result<()> {
        self.vault_url = normalize_vault_url(&self.vault_url)?;
        Ok(())
    }

    /// Check the shape invariants of an entry loaded from disk.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.vault_url.trim().is_empty() {
            return Err(AzkvError::Validation("vault_url cannot be empty".into()));
        }
        if self.auth_record.is_some() != self.last_login_time.is_some() {
            return Err(AzkvError::Validation(format!(
                "vault '{}' has only one of auth_record/last_login_time",
                self.vault_url
            )));
        }
        Ok(())
    }
}

/// Normalize user-entered vault URLs and reject anything that is not
/// `http(s)://host[...]`.
///
/// Surrounding quotes and whitespace are stripped, as is a trailing `/`,
/// so the same vault always maps to the same registry key.
pub fn normalize_vault_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_matches(|c: char| c == '"' || c == '\'').trim();
    let url = trimmed.trim_end_matches('/');

    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| {
            AzkvError::Validation(format!("'{trimmed}' is not a valid URL (expected https://...)"))
        })?;

    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() || host.starts_with(':') || host.contains(char::is_whitespace) {
        return Err(AzkvError::Validation(format!(
            "'{trimmed}' is not a valid URL (missing host)"
        )));
    }

    Ok(url.to_string())
}

/// Short display name for a vault: the first label of its host.
///
/// `https://kv-prod.vault.azure.net` -> `kv-prod`
pub fn vault_short_name(vault_url: &str) -> &str {
    let rest = vault_url
        .split_once("://")
        .map_or(vault_url, |(_, rest)| rest);
    let host = rest.split(['/', ':']).next().unwrap_or(rest);
    host.split('.').next().unwrap_or(host)
}
